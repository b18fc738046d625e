// Core enumerations shared by EXL requests, responses and notifications
use crate::validate::Violation;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A closed set of names that appear verbatim on the wire.
pub trait Named: Copy + 'static {
    /// Field name used when reporting a bad value.
    const FIELD: &'static str;
    /// Every member, in wire order.
    const ALL: &'static [Self];

    fn as_str(self) -> &'static str;

    fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|v| v.as_str()).collect()
    }
}

fn parse_named<T: Named>(s: &str) -> Result<T, Violation> {
    T::ALL
        .iter()
        .copied()
        .find(|v| v.as_str() == s)
        .ok_or_else(|| {
            Violation::not_in_set(
                vec![T::FIELD.to_string()],
                &T::names(),
                Value::String(s.to_string()),
            )
        })
}

macro_rules! named_display {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }

            impl FromStr for $ty {
                type Err = Violation;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    parse_named(s)
                }
            }
        )*
    };
}

// User account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Named for Role {
    const FIELD: &'static str = "role";
    const ALL: &'static [Self] = &[Role::Admin, Role::User];

    fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

/// Subscription channel. `!all` subscribes to every channel at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    #[serde(rename = "!all")]
    All,
    Alerts,
    Clients,
    Debug,
    Error,
    Measurements,
    Sensors,
    Solution,
    Systemtime,
    Tags,
}

impl Named for Channel {
    const FIELD: &'static str = "channel";
    const ALL: &'static [Self] = &[
        Channel::All,
        Channel::Alerts,
        Channel::Clients,
        Channel::Debug,
        Channel::Error,
        Channel::Measurements,
        Channel::Sensors,
        Channel::Solution,
        Channel::Systemtime,
        Channel::Tags,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Channel::All => "!all",
            Channel::Alerts => "alerts",
            Channel::Clients => "clients",
            Channel::Debug => "debug",
            Channel::Error => "error",
            Channel::Measurements => "measurements",
            Channel::Sensors => "sensors",
            Channel::Solution => "solution",
            Channel::Systemtime => "systemtime",
            Channel::Tags => "tags",
        }
    }
}

// Event reported on the `clients` channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientEvent {
    Connected,
    Disconnected,
    Login,
    Logout,
    Subscribed,
    Unsubscribed,
}

impl Named for ClientEvent {
    const FIELD: &'static str = "event";
    const ALL: &'static [Self] = &[
        ClientEvent::Connected,
        ClientEvent::Disconnected,
        ClientEvent::Login,
        ClientEvent::Logout,
        ClientEvent::Subscribed,
        ClientEvent::Unsubscribed,
    ];

    fn as_str(self) -> &'static str {
        match self {
            ClientEvent::Connected => "connected",
            ClientEvent::Disconnected => "disconnected",
            ClientEvent::Login => "login",
            ClientEvent::Logout => "logout",
            ClientEvent::Subscribed => "subscribed",
            ClientEvent::Unsubscribed => "unsubscribed",
        }
    }
}

// Event reported on the `alerts` channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertEvent {
    Lost,
    Compromised,
    Cancel,
}

impl Named for AlertEvent {
    const FIELD: &'static str = "event";
    const ALL: &'static [Self] = &[AlertEvent::Lost, AlertEvent::Compromised, AlertEvent::Cancel];

    fn as_str(self) -> &'static str {
        match self {
            AlertEvent::Lost => "lost",
            AlertEvent::Compromised => "compromised",
            AlertEvent::Cancel => "cancel",
        }
    }
}

// Reading type on the `sensors` channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Temp,
    Pressure,
    Humidity,
}

impl Named for SensorKind {
    const FIELD: &'static str = "type";
    const ALL: &'static [Self] = &[SensorKind::Temp, SensorKind::Pressure, SensorKind::Humidity];

    fn as_str(self) -> &'static str {
        match self {
            SensorKind::Temp => "temp",
            SensorKind::Pressure => "pressure",
            SensorKind::Humidity => "humidity",
        }
    }
}

named_display!(Role, Channel, ClientEvent, AlertEvent, SensorKind);

/// Tag operating mode: a mode number, or one of the server's string aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagMode {
    Number(i64),
    Alias(String),
}

impl From<i64> for TagMode {
    fn from(mode: i64) -> Self {
        TagMode::Number(mode)
    }
}

impl From<&str> for TagMode {
    fn from(alias: &str) -> Self {
        TagMode::Alias(alias.to_string())
    }
}

impl FromStr for TagMode {
    type Err = Violation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.parse::<i64>().map_or_else(|_| TagMode::Alias(s.to_string()), TagMode::Number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::ViolationKind;

    #[test]
    fn channel_names_round_trip_through_from_str() {
        for channel in Channel::ALL {
            assert_eq!(channel.as_str().parse::<Channel>().unwrap(), *channel);
        }
        assert_eq!("!all".parse::<Channel>().unwrap(), Channel::All);
    }

    #[test]
    fn unknown_role_is_not_in_set() {
        let err = "root".parse::<Role>().unwrap_err();
        assert_eq!(err.kind, ViolationKind::NotInSet);
        assert_eq!(err.loc, vec!["role".to_string()]);
        assert_eq!(err.input, Some(Value::String("root".into())));
        assert!(err.msg.contains("'admin'"));
    }

    #[test]
    fn serde_names_match_wire_names() {
        assert_eq!(serde_json::to_value(Channel::All).unwrap(), "!all");
        assert_eq!(serde_json::to_value(Channel::Systemtime).unwrap(), "systemtime");
        assert_eq!(serde_json::to_value(Role::Admin).unwrap(), "admin");
        assert_eq!(serde_json::to_value(SensorKind::Humidity).unwrap(), "humidity");
    }

    #[test]
    fn tag_mode_parses_numbers_and_aliases() {
        assert_eq!("3".parse::<TagMode>().unwrap(), TagMode::Number(3));
        assert_eq!("lowpower".parse::<TagMode>().unwrap(), TagMode::Alias("lowpower".into()));
        assert_eq!(serde_json::to_value(TagMode::from(2)).unwrap(), 2);
        assert_eq!(serde_json::to_value(TagMode::from("fast")).unwrap(), "fast");
    }
}
