//! Typed health permissions and their textual identifiers.
//!
//! Identifiers live under [`HEALTH_PERMISSION_PREFIX`]. Fitness permissions are
//! `READ_<TYPE>` / `WRITE_<TYPE>`, medical permissions are `WRITE_MEDICAL_DATA`
//! and `READ_MEDICAL_DATA_<TYPE>`, and the three additional permissions have
//! fixed names.

use crate::error::EngineError;
use crate::types::{Category, Scope};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const HEALTH_PERMISSION_PREFIX: &str = "android.permission.health.";

const READ_PREFIX: &str = "READ_";
const WRITE_PREFIX: &str = "WRITE_";
const READ_MEDICAL_PREFIX: &str = "READ_MEDICAL_DATA_";
const WRITE_ALL_MEDICAL: &str = "WRITE_MEDICAL_DATA";

macro_rules! data_types {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

data_types! {
    /// Wellness data types that carry a read and a write permission each.
    FitnessType {
        ActiveCaloriesBurned => "ACTIVE_CALORIES_BURNED",
        ActivityIntensity => "ACTIVITY_INTENSITY",
        BasalBodyTemperature => "BASAL_BODY_TEMPERATURE",
        BasalMetabolicRate => "BASAL_METABOLIC_RATE",
        BloodGlucose => "BLOOD_GLUCOSE",
        BloodPressure => "BLOOD_PRESSURE",
        BodyFat => "BODY_FAT",
        BodyTemperature => "BODY_TEMPERATURE",
        BodyWaterMass => "BODY_WATER_MASS",
        BoneMass => "BONE_MASS",
        CervicalMucus => "CERVICAL_MUCUS",
        Distance => "DISTANCE",
        ElevationGained => "ELEVATION_GAINED",
        Exercise => "EXERCISE",
        ExerciseRoute => "EXERCISE_ROUTE",
        FloorsClimbed => "FLOORS_CLIMBED",
        HeartRate => "HEART_RATE",
        HeartRateVariability => "HEART_RATE_VARIABILITY",
        Height => "HEIGHT",
        Hydration => "HYDRATION",
        IntermenstrualBleeding => "INTERMENSTRUAL_BLEEDING",
        LeanBodyMass => "LEAN_BODY_MASS",
        Menstruation => "MENSTRUATION",
        Mindfulness => "MINDFULNESS",
        Nutrition => "NUTRITION",
        OvulationTest => "OVULATION_TEST",
        OxygenSaturation => "OXYGEN_SATURATION",
        PlannedExercise => "PLANNED_EXERCISE",
        Power => "POWER",
        RespiratoryRate => "RESPIRATORY_RATE",
        RestingHeartRate => "RESTING_HEART_RATE",
        SexualActivity => "SEXUAL_ACTIVITY",
        SkinTemperature => "SKIN_TEMPERATURE",
        Sleep => "SLEEP",
        Speed => "SPEED",
        Steps => "STEPS",
        TotalCaloriesBurned => "TOTAL_CALORIES_BURNED",
        Vo2Max => "VO2_MAX",
        Weight => "WEIGHT",
        WheelchairPushes => "WHEELCHAIR_PUSHES",
    }
}

data_types! {
    /// Clinical record types. `AllMedicalData` is the write-all right.
    MedicalType {
        AllMedicalData => "ALL_MEDICAL_DATA",
        AllergiesIntolerances => "ALLERGIES_INTOLERANCES",
        Conditions => "CONDITIONS",
        LaboratoryResults => "LABORATORY_RESULTS",
        Medications => "MEDICATIONS",
        PersonalDetails => "PERSONAL_DETAILS",
        PractitionerDetails => "PRACTITIONER_DETAILS",
        Pregnancy => "PREGNANCY",
        Procedures => "PROCEDURES",
        SocialHistory => "SOCIAL_HISTORY",
        Vaccines => "VACCINES",
        Visits => "VISITS",
        VitalSigns => "VITAL_SIGNS",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdditionalKind {
    ExerciseRoutes,
    History,
    Background,
}

impl AdditionalKind {
    pub const ALL: &'static [AdditionalKind] = &[
        AdditionalKind::ExerciseRoutes,
        AdditionalKind::History,
        AdditionalKind::Background,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            AdditionalKind::ExerciseRoutes => "READ_EXERCISE_ROUTES",
            AdditionalKind::History => "READ_HEALTH_DATA_HISTORY",
            AdditionalKind::Background => "READ_HEALTH_DATA_IN_BACKGROUND",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.as_str() == name)
    }
}

/// A single health permission.
///
/// Serialized as its full textual identifier so it can key JSON maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Permission {
    Fitness {
        data_type: FitnessType,
        access: AccessType,
    },
    Medical {
        data_type: MedicalType,
    },
    Additional {
        kind: AdditionalKind,
    },
}

impl Permission {
    pub const EXERCISE_READ: Permission = Permission::Fitness {
        data_type: FitnessType::Exercise,
        access: AccessType::Read,
    };
    pub const EXERCISE_ROUTES: Permission = Permission::Additional {
        kind: AdditionalKind::ExerciseRoutes,
    };
    pub const HISTORY: Permission = Permission::Additional {
        kind: AdditionalKind::History,
    };
    pub const BACKGROUND: Permission = Permission::Additional {
        kind: AdditionalKind::Background,
    };

    pub fn fitness_read(data_type: FitnessType) -> Self {
        Permission::Fitness { data_type, access: AccessType::Read }
    }

    pub fn fitness_write(data_type: FitnessType) -> Self {
        Permission::Fitness { data_type, access: AccessType::Write }
    }

    pub fn medical(data_type: MedicalType) -> Self {
        Permission::Medical { data_type }
    }

    pub fn additional(kind: AdditionalKind) -> Self {
        Permission::Additional { kind }
    }

    pub fn category(&self) -> Category {
        match self {
            Permission::Fitness { .. } => Category::Fitness,
            Permission::Medical { .. } => Category::Medical,
            Permission::Additional { .. } => Category::Additional,
        }
    }

    /// Base read permission. Additional permissions never count as reads.
    pub fn is_read(&self) -> bool {
        self.is_fitness_read() || self.is_medical_read()
    }

    pub fn is_fitness_read(&self) -> bool {
        matches!(self, Permission::Fitness { access: AccessType::Read, .. })
    }

    pub fn is_medical_read(&self) -> bool {
        matches!(self, Permission::Medical { data_type } if *data_type != MedicalType::AllMedicalData)
    }

    pub fn is_medical_write(&self) -> bool {
        matches!(self, Permission::Medical { data_type: MedicalType::AllMedicalData })
    }

    pub fn is_additional(&self) -> bool {
        matches!(self, Permission::Additional { .. })
    }

    /// Whether this is a base read belonging to `scope`.
    pub fn is_read_in(&self, scope: Scope) -> bool {
        match scope {
            Scope::Fitness => self.is_fitness_read(),
            Scope::Medical => self.is_medical_read(),
            Scope::All => self.is_read(),
        }
    }

    pub fn in_scope(&self, scope: Scope) -> bool {
        match scope {
            Scope::Fitness => self.category() == Category::Fitness,
            Scope::Medical => self.category() == Category::Medical,
            Scope::All => true,
        }
    }

    /// Identifier without the namespace prefix, e.g. `READ_STEPS`.
    pub fn short_name(&self) -> String {
        match self {
            Permission::Fitness { data_type, access: AccessType::Read } => {
                format!("{}{}", READ_PREFIX, data_type)
            }
            Permission::Fitness { data_type, access: AccessType::Write } => {
                format!("{}{}", WRITE_PREFIX, data_type)
            }
            Permission::Medical { data_type: MedicalType::AllMedicalData } => {
                WRITE_ALL_MEDICAL.to_string()
            }
            Permission::Medical { data_type } => format!("{}{}", READ_MEDICAL_PREFIX, data_type),
            Permission::Additional { kind } => kind.as_str().to_string(),
        }
    }

    pub fn id(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", HEALTH_PERMISSION_PREFIX, self.short_name())
    }
}

impl FromStr for Permission {
    type Err = EngineError;

    fn from_str(id: &str) -> Result<Self, Self::Err> {
        let unrecognized = || EngineError::Unrecognized(id.to_string());
        let name = id.strip_prefix(HEALTH_PERMISSION_PREFIX).ok_or_else(unrecognized)?;

        if let Some(kind) = AdditionalKind::from_name(name) {
            return Ok(Permission::Additional { kind });
        }

        if name == WRITE_ALL_MEDICAL {
            return Ok(Permission::medical(MedicalType::AllMedicalData));
        }
        if let Some(rest) = name.strip_prefix(READ_MEDICAL_PREFIX) {
            return match MedicalType::from_name(rest) {
                Some(MedicalType::AllMedicalData) | None => Err(unrecognized()),
                Some(data_type) => Ok(Permission::medical(data_type)),
            };
        }

        let (access, rest) = if let Some(rest) = name.strip_prefix(READ_PREFIX) {
            (AccessType::Read, rest)
        } else if let Some(rest) = name.strip_prefix(WRITE_PREFIX) {
            (AccessType::Write, rest)
        } else {
            return Err(unrecognized());
        };

        FitnessType::from_name(rest)
            .map(|data_type| Permission::Fitness { data_type, access })
            .ok_or_else(unrecognized)
    }
}

impl TryFrom<String> for Permission {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Permission> for String {
    fn from(permission: Permission) -> Self {
        permission.id()
    }
}
