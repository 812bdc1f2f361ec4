use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

macro_rules! permissions {
    ($($variant:ident => $token:literal,)+) => {
        /// A capability token from the closed `<domain>.<action>` vocabulary.
        ///
        /// Tokens are opaque: two permissions are equal only when they are the
        /// same token. There is no wildcard or prefix matching.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum Permission {
            $($variant,)+
        }

        impl Permission {
            pub const ALL: &'static [Permission] = &[$(Permission::$variant,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Permission::$variant => $token,)+
                }
            }
        }

        impl FromStr for Permission {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($token => Ok(Permission::$variant),)+
                    other => Err(format!("Unknown permission: {other}")),
                }
            }
        }
    };
}

permissions! {
    MembersView => "members.view",
    MembersCreate => "members.create",
    MembersEdit => "members.edit",
    MembersDelete => "members.delete",
    EventsView => "events.view",
    EventsCreate => "events.create",
    EventsEdit => "events.edit",
    EventsDelete => "events.delete",
    ServicesView => "services.view",
    ServicesCreate => "services.create",
    ServicesEdit => "services.edit",
    ServicesDelete => "services.delete",
    CheckinView => "checkin.view",
    CheckinManage => "checkin.manage",
    GivingView => "giving.view",
    GivingRecord => "giving.record",
    MessagesView => "messages.view",
    MessagesSend => "messages.send",
    ReportsView => "reports.view",
    BranchesView => "branches.view",
    BranchesManage => "branches.manage",
    UsersView => "users.view",
    UsersManage => "users.manage",
    SettingsView => "settings.view",
    SettingsManage => "settings.manage",
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Permission {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        token.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_parse_back_to_their_variant() {
        for permission in Permission::ALL {
            assert_eq!(permission.as_str().parse::<Permission>(), Ok(*permission));
        }
    }

    #[test]
    fn tokens_are_namespaced() {
        for permission in Permission::ALL {
            let (domain, action) = permission.as_str().split_once('.').unwrap();
            assert!(!domain.is_empty() && !action.is_empty());
        }
    }

    #[test]
    fn unknown_and_pattern_tokens_are_rejected() {
        assert!("members.*".parse::<Permission>().is_err());
        assert!("members".parse::<Permission>().is_err());
        assert!("Members.View".parse::<Permission>().is_err());
    }

    #[test]
    fn serializes_as_plain_token() {
        let json = serde_json::to_string(&Permission::GivingRecord).unwrap();
        assert_eq!(json, "\"giving.record\"");
        let back: Permission = serde_json::from_str("\"checkin.manage\"").unwrap();
        assert_eq!(back, Permission::CheckinManage);
    }
}
