// src/profiles.rs
//! Built-in reference profiles and profile-set validation.

use std::collections::HashSet;

use crate::error::PipelineError;
use crate::model::{Lifestyle, UserProfile};

fn profile(
    label: &str,
    height: f32,
    weight: f32,
    age: u32,
    lifestyle: Lifestyle,
    conditions: &[&str],
) -> UserProfile {
    UserProfile {
        label: label.to_string(),
        age,
        weight,
        height,
        lifestyle,
        conditions: conditions.iter().map(|c| c.to_string()).collect(),
    }
}

/// The six profiles used when a caller supplies none.
pub fn default_profiles() -> Vec<UserProfile> {
    vec![
        profile(
            "The Type 1 Diabetic",
            170.0,
            68.0,
            30,
            Lifestyle::Active,
            &["Diabetes Type 1", "Insulin Dependent"],
        ),
        profile(
            "The Type 2 Diabetic",
            175.0,
            105.0,
            50,
            Lifestyle::Sedentary,
            &["Diabetes Type 2", "Obesity"],
        ),
        profile(
            "Weight Loss Goal",
            168.0,
            90.0,
            35,
            Lifestyle::Sedentary,
            &["Obesity", "Caloric Deficit Goal"],
        ),
        profile(
            "Weight Gain / Muscle Build",
            182.0,
            70.0,
            24,
            Lifestyle::VeryActive,
            &["Underweight", "High Calorie Goal"],
        ),
        profile(
            "The Dialysis Patient",
            175.0,
            75.0,
            60,
            Lifestyle::Sedentary,
            &["End Stage Renal Disease", "Hemodialysis"],
        ),
        profile(
            "The Hypertensive Patient",
            178.0,
            85.0,
            55,
            Lifestyle::Sedentary,
            &["Hypertension", "High Cholesterol"],
        ),
    ]
}

/// Caller profiles, or the defaults when none are given. Labels must be non-blank and unique.
pub fn resolve_profiles(profiles: Option<Vec<UserProfile>>) -> Result<Vec<UserProfile>, PipelineError> {
    let profiles = match profiles {
        Some(p) if !p.is_empty() => p,
        _ => return Ok(default_profiles()),
    };
    let mut seen = HashSet::new();
    for p in &profiles {
        let label = p.label.trim();
        if label.is_empty() {
            return Err(PipelineError::input("profile label must not be blank"));
        }
        if !seen.insert(label.to_string()) {
            return Err(PipelineError::input(format!("duplicate profile label: {label}")));
        }
    }
    Ok(profiles)
}
