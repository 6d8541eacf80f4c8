use serde::{Deserialize, Serialize};

pub const LOW_FUEL_BELOW: f64 = 15.0;
pub const HIGH_TEMPERATURE_ABOVE: f64 = 100.0;
pub const OVERSPEED_ABOVE: f64 = 120.0;

/// Health classification of a single reading. Anything but `Normal` is
/// published as an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Normal,
    CombustibleBajo,
    TemperaturaAlta,
    ExcesoVelocidad,
}

impl Status {
    /// First matching rule wins: fuel, then temperature, then speed.
    pub fn classify(combustible: f64, temperatura: f64, velocidad: f64) -> Self {
        if combustible < LOW_FUEL_BELOW {
            Self::CombustibleBajo
        } else if temperatura > HIGH_TEMPERATURE_ABOVE {
            Self::TemperaturaAlta
        } else if velocidad > OVERSPEED_ABOVE {
            Self::ExcesoVelocidad
        } else {
            Self::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::CombustibleBajo => "combustible_bajo",
            Self::TemperaturaAlta => "temperatura_alta",
            Self::ExcesoVelocidad => "exceso_velocidad",
        }
    }

    pub fn is_alert(&self) -> bool {
        *self != Self::Normal
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
