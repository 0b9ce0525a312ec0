//! Simulated reactor status and theory lesson. Diagnostic surface only; no
//! auth, no storage.

use rand::Rng;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(default = "default_temp")]
    pub temp: f64,
}

fn default_temp() -> f64 {
    300.0
}

const CRITICAL_TEMP: f64 = 420.0;
const LOW_TEMP: f64 = 330.0;

/// Classify a fluctuated temperature into a theory lesson.
pub fn lesson_for(temp: f64) -> (&'static str, &'static str) {
    if temp < LOW_TEMP {
        (
            "KINETIC THEORY: at low temperatures the mean molecular speed drops. Watch how \
             collisions against the reactor walls become less frequent.",
            "CONCEPT: LOW THERMAL ENERGY",
        )
    } else if temp <= CRITICAL_TEMP {
        (
            "GAY-LUSSAC'S LAW: at constant volume, pressure is directly proportional to \
             temperature. See how the pressure HUD climbs with the heat?",
            "CONCEPT: DIRECT PROPORTIONALITY",
        )
    } else {
        (
            "CRITICAL STATE: the particles have gained so much kinetic energy that the \
             containment field is failing. This is what a runaway fusion looks like!",
            "CONCEPT: MAXIMUM ENTROPY",
        )
    }
}

/// Apply a ±2 K fluctuation and build the status payload.
pub fn simulate(base_temp: f64) -> Value {
    let current_temp = base_temp + rand::rng().random_range(-2.0..=2.0);
    let (advice, lesson) = lesson_for(current_temp);

    serde_json::json!({
        "temp": current_temp,
        "pressure": current_temp * 1.5,
        "is_critical": current_temp > CRITICAL_TEMP,
        "ai_advice": advice,
        "current_lesson": lesson,
    })
}
