//! Small authored case shared by unit tests.
use chrono::{DateTime, TimeDelta, Utc};

use crate::case::CaseDefinition;

pub const CASE_JSON: &str = r#"{
    "id": "pericarditis-lite",
    "title": "Sharp chest pain",
    "start_scene_id": "arrival",
    "starting_budget": 20,
    "starting_rapport": 50,
    "candidate_diagnoses": ["Pericarditis", "Myocardial infarction", "Pulmonary embolism", "Reflux"],
    "scenes": [
        {
            "id": "arrival",
            "act": "opening",
            "narration": "A 34-year-old arrives with chest pain.",
            "clues": [
                { "id": "c-vitals", "label": "Vitals", "category": "vitals", "value": "HR 104", "is_key_finding": true }
            ],
            "interaction": { "mode": "narrative", "next_scene_id": "history" }
        },
        {
            "id": "history",
            "act": "history",
            "narration": "The patient looks anxious.",
            "interaction": {
                "mode": "choices",
                "options": [
                    { "id": "listen", "label": "Let them tell it", "target_scene_id": "exam", "rapport_effect": 10, "is_optimal": true, "xp_modifier": 10 },
                    { "id": "rush", "label": "Cut to the point", "target_scene_id": "exam", "cp_cost": 1, "rapport_effect": -15, "xp_modifier": -20 },
                    { "id": "broken", "label": "Page nobody", "target_scene_id": "void", "cp_cost": 2, "rapport_effect": 5 }
                ]
            }
        },
        {
            "id": "exam",
            "act": "examination",
            "narration": "You examine the patient.",
            "interaction": {
                "mode": "exam_zones",
                "next_scene_id": "ddx1",
                "zones": [
                    {
                        "region_id": "chest", "label": "Chest", "cp_cost": 2, "is_key_finding": true,
                        "clues": [{ "id": "c-rub", "label": "Friction rub", "category": "exam" }]
                    },
                    {
                        "region_id": "abdomen", "label": "Abdomen", "cp_cost": 1,
                        "clues": [{ "id": "c-soft", "label": "Soft abdomen", "category": "exam" }]
                    }
                ]
            }
        },
        {
            "id": "ddx1",
            "act": "diagnosis",
            "narration": "What are you thinking?",
            "interaction": { "mode": "ddx_check", "next_scene_id": "labs" }
        },
        {
            "id": "labs",
            "act": "investigation",
            "narration": "The nurse needs orders now.",
            "cp_cost": 1,
            "rapport_effect": -2,
            "interaction": {
                "mode": "timed_choice",
                "seconds": 30,
                "default_option_id": "troponin",
                "options": [
                    { "id": "troponin", "label": "Order troponin", "target_scene_id": "ddx2", "cp_cost": 3, "is_optimal": true, "xp_modifier": 5 },
                    { "id": "discharge", "label": "Discharge", "target_scene_id": "reveal", "rapport_effect": -5, "xp_modifier": -50 }
                ]
            }
        },
        {
            "id": "ddx2",
            "act": "diagnosis",
            "narration": "Troponin is normal.",
            "interaction": { "mode": "ddx_check", "next_scene_id": "reveal" }
        },
        {
            "id": "reveal",
            "act": "resolution",
            "narration": "The ECG shows diffuse ST elevation.",
            "interaction": { "mode": "diagnosis_reveal" }
        }
    ],
    "answer_key": {
        "optimal_path": ["arrival", "history", "exam", "ddx1", "labs", "ddx2", "reveal"],
        "optimal_cp_spend": 6,
        "expert_ddx": [
            { "scene_id": "ddx1", "diagnoses": ["Pericarditis", "Myocardial infarction", "Pulmonary embolism"] },
            { "scene_id": "ddx2", "diagnoses": ["Pericarditis", "Myocardial infarction"] }
        ],
        "final_diagnosis": "Acute pericarditis",
        "learning_notes": ["A friction rub is pathognomonic."]
    }
}"#;

pub fn case() -> CaseDefinition {
    CaseDefinition::from_json(CASE_JSON).expect("fixture case parses")
}

pub fn t0() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

pub fn at(seconds: i64) -> DateTime<Utc> {
    t0() + TimeDelta::seconds(seconds)
}
