// Unsolicited notification messages pushed by the EXL server on joined channels
use crate::types::{AlertEvent, Channel, ClientEvent, Named, SensorKind};
use crate::validate::{FromFields, Fields, Violation};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One anchor-to-tag range, `[bs_id, distance, signal_power, ...]` on the wire.
///
/// Entries are kept as sent; firmware versions differ in trailing fields and
/// in whether the base station ID is text or a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ranging(pub Vec<Value>);

impl Ranging {
    pub fn base_station(&self) -> Option<String> {
        match self.0.first()? {
            Value::String(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }

    pub fn distance(&self) -> Option<f64> {
        self.0.get(1).and_then(Value::as_f64)
    }

    pub fn signal_power(&self) -> Option<f64> {
        self.0.get(2).and_then(Value::as_f64)
    }
}

/// Raw two-way-ranging distances between base stations and one tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    #[serde(rename = "type")]
    pub kind: String,
    pub time: String,
    pub tag: String,
    pub meas: Vec<Ranging>,
}

impl FromFields for Measurement {
    fn from_fields(fields: &mut Fields<'_>) -> Option<Self> {
        let kind = fields.optional("type").map(|k| k.unwrap_or_else(|| "twr".to_string()));
        let time = fields.required("time");
        let tag = fields.required("tag");
        let meas = fields.required("meas");
        Some(Measurement {
            kind: kind?,
            time: time?,
            tag: tag?,
            meas: meas?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Velocity {
    pub speed: f64,
    pub vertical: f64,
    pub heading_lcl: f64,
    pub heading_trf: Option<f64>,
}

impl FromFields for Velocity {
    fn from_fields(fields: &mut Fields<'_>) -> Option<Self> {
        let speed = fields.required("speed");
        let vertical = fields.required("vertical");
        let heading_lcl = fields.required("heading_lcl");
        let heading_trf = fields.optional("heading_trf");
        Some(Velocity {
            speed: speed?,
            vertical: vertical?,
            heading_lcl: heading_lcl?,
            heading_trf: heading_trf?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Accuracy {
    pub horizontal: f64,
    pub vertical: f64,
}

impl FromFields for Accuracy {
    fn from_fields(fields: &mut Fields<'_>) -> Option<Self> {
        let horizontal = fields.required("horizontal");
        let vertical = fields.required("vertical");
        Some(Accuracy {
            horizontal: horizontal?,
            vertical: vertical?,
        })
    }
}

/// Computed tag position, in the local frame and in the WGS84 frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Solution {
    pub time: String,
    pub tag: String,
    pub validity: String,
    pub position_lcl: Vec<f64>,
    pub position_trf: Vec<f64>,
    pub velocity: Velocity,
    pub accuracy: Accuracy,
}

impl FromFields for Solution {
    fn from_fields(fields: &mut Fields<'_>) -> Option<Self> {
        let time = fields.required("time");
        let tag = fields.required("tag");
        let validity = fields.required("validity");
        let position_lcl = fields.required("position_lcl");
        let position_trf = fields.required("position_trf");
        let velocity = fields.required_nested("velocity");
        let accuracy = fields.required_nested("accuracy");
        Some(Solution {
            time: time?,
            tag: tag?,
            validity: validity?,
            position_lcl: position_lcl?,
            position_trf: position_trf?,
            velocity: velocity?,
            accuracy: accuracy?,
        })
    }
}

/// Sensor reading; exactly one of the value fields is set, matching `kind`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    #[serde(rename = "type")]
    pub kind: SensorKind,
    pub time: String,
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<i64>,
}

impl FromFields for SensorReading {
    fn from_fields(fields: &mut Fields<'_>) -> Option<Self> {
        let kind = fields.required::<SensorKind>("type");
        let time = fields.required("time");
        let tag = fields.required("tag");
        let (mut temp, mut pressure, mut humidity) = (None, None, None);
        let has_value = match kind {
            Some(SensorKind::Temp) => {
                temp = fields.bounded("temp", -40.0..=85.0);
                temp.is_some()
            }
            Some(SensorKind::Pressure) => {
                pressure = fields.required("pressure");
                pressure.is_some()
            }
            Some(SensorKind::Humidity) => {
                humidity = fields.bounded("humidity", 0.0..=100.0);
                humidity.is_some()
            }
            None => false,
        };
        if !has_value {
            return None;
        }
        Some(SensorReading {
            kind: kind?,
            time: time?,
            tag: tag?,
            temp,
            pressure,
            humidity,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub alert: String,
    pub event: Vec<AlertEvent>,
    pub bs: String,
    pub desc: String,
}

impl FromFields for Alert {
    fn from_fields(fields: &mut Fields<'_>) -> Option<Self> {
        let alert = fields.required("alert");
        let event = fields.required("event");
        let bs = fields.required("bs");
        let desc = fields.required("desc");
        Some(Alert {
            alert: alert?,
            event: event?,
            bs: bs?,
            desc: desc?,
        })
    }
}

/// Another API client connected, logged in, subscribed, and so on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientActivity {
    pub conn: String,
    pub ip_address: String,
    pub event: ClientEvent,
    pub user: Option<String>,
    pub reason: Option<String>,
    pub target_channel: Option<String>,
}

impl FromFields for ClientActivity {
    fn from_fields(fields: &mut Fields<'_>) -> Option<Self> {
        let conn = fields.required("conn");
        let ip_address = fields.required("ip_address");
        let event = fields.required("event");
        let user = fields.optional("user");
        let reason = fields.optional("reason");
        let target_channel = fields.optional("target_channel");
        Some(ClientActivity {
            conn: conn?,
            ip_address: ip_address?,
            event: event?,
            user: user?,
            reason: reason?,
            target_channel: target_channel?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugMessage {
    pub message: String,
}

impl FromFields for DebugMessage {
    fn from_fields(fields: &mut Fields<'_>) -> Option<Self> {
        let message = fields.required("message");
        Some(DebugMessage { message: message? })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerFault {
    pub code: i64,
    pub desc: String,
}

impl FromFields for ServerFault {
    fn from_fields(fields: &mut Fields<'_>) -> Option<Self> {
        let code = fields.required("code");
        let desc = fields.required("desc");
        Some(ServerFault {
            code: code?,
            desc: desc?,
        })
    }
}

/// A notification, keyed on the wire by its `channel` field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "channel", rename_all = "lowercase")]
pub enum Notification {
    Measurements(Measurement),
    Solution(Solution),
    Sensors(SensorReading),
    Alerts(Alert),
    Clients(ClientActivity),
    Debug(DebugMessage),
    Error(ServerFault),
}

const NOTIFYING_CHANNELS: &[Channel] = &[
    Channel::Measurements,
    Channel::Solution,
    Channel::Sensors,
    Channel::Alerts,
    Channel::Clients,
    Channel::Debug,
    Channel::Error,
];

impl FromFields for Notification {
    fn from_fields(fields: &mut Fields<'_>) -> Option<Self> {
        let channel = fields.required::<Channel>("channel")?;
        match channel {
            Channel::Measurements => Measurement::from_fields(fields).map(Notification::Measurements),
            Channel::Solution => Solution::from_fields(fields).map(Notification::Solution),
            Channel::Sensors => SensorReading::from_fields(fields).map(Notification::Sensors),
            Channel::Alerts => Alert::from_fields(fields).map(Notification::Alerts),
            Channel::Clients => ClientActivity::from_fields(fields).map(Notification::Clients),
            Channel::Debug => DebugMessage::from_fields(fields).map(Notification::Debug),
            Channel::Error => ServerFault::from_fields(fields).map(Notification::Error),
            Channel::All | Channel::Systemtime | Channel::Tags => {
                let allowed: Vec<&str> = NOTIFYING_CHANNELS.iter().map(|c| c.as_str()).collect();
                fields.push(Violation::not_in_set(
                    vec!["channel".into()],
                    &allowed,
                    Value::String(channel.as_str().to_string()),
                ));
                None
            }
        }
    }
}

impl Notification {
    pub fn channel(&self) -> Channel {
        match self {
            Notification::Measurements(_) => Channel::Measurements,
            Notification::Solution(_) => Channel::Solution,
            Notification::Sensors(_) => Channel::Sensors,
            Notification::Alerts(_) => Channel::Alerts,
            Notification::Clients(_) => Channel::Clients,
            Notification::Debug(_) => Channel::Debug,
            Notification::Error(_) => Channel::Error,
        }
    }

    /// Tag the notification is about, if any.
    pub fn tag(&self) -> Option<&str> {
        match self {
            Notification::Measurements(m) => Some(&m.tag),
            Notification::Solution(s) => Some(&s.tag),
            Notification::Sensors(s) => Some(&s.tag),
            _ => None,
        }
    }

    /// One-line human readable description.
    pub fn summary(&self) -> String {
        match self {
            Notification::Measurements(m) => {
                format!("tag {} {} ranges at {}", m.tag, m.meas.len(), m.time)
            }
            Notification::Solution(s) => format!(
                "tag {} at {:?} ({}, ±{:.2} m)",
                s.tag, s.position_lcl, s.validity, s.accuracy.horizontal
            ),
            Notification::Sensors(s) => {
                let value = match s.kind {
                    SensorKind::Temp => s.temp.map(|v| format!("{} C", v)),
                    SensorKind::Pressure => s.pressure.map(|v| format!("{} Pa", v)),
                    SensorKind::Humidity => s.humidity.map(|v| format!("{} %", v)),
                };
                format!("tag {} {} {}", s.tag, s.kind, value.unwrap_or_default())
            }
            Notification::Alerts(a) => format!("alert {} on bs {}: {}", a.alert, a.bs, a.desc),
            Notification::Clients(c) => {
                format!("client {} ({}) {}", c.conn, c.ip_address, c.event)
            }
            Notification::Debug(d) => d.message.clone(),
            Notification::Error(e) => format!("error {}: {}", e.code, e.desc),
        }
    }
}
