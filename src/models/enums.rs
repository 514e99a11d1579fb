use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(RequestStatus {
    PendingConfirmation => "pending_confirmation",
    Approved => "approved",
    Rejected => "rejected",
    Administered => "administered",
    Discontinued => "discontinued",
});

impl RequestStatus {
    /// Rejected, Administered and Discontinued accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Administered | Self::Discontinued)
    }
}

str_enum!(RequestAction {
    Edit => "edit",
    Accept => "accept",
    Reject => "reject",
    MarkAdministered => "administer",
    Discontinue => "discontinue",
});

str_enum!(Role {
    Parent => "parent",
    Nurse => "nurse",
    Manager => "manager",
    Admin => "admin",
    Student => "student",
});

impl Role {
    /// School staff who may read any student's medication requests.
    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Nurse | Self::Manager | Self::Admin)
    }
}

str_enum!(NotificationKind {
    MedicationApproved => "medication_approved",
    MedicationRejected => "medication_rejected",
    MedicationDiscontinued => "medication_discontinued",
});
