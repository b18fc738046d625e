// EXL protocol messages - pure data structures, no I/O
use crate::types::{Channel, Role, TagMode};
use crate::validate::{FromFields, Fields, ValidationError, Violation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------

/// Account to create. `roles` and `desc` are omitted on the wire when unset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewUser {
    pub login: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<Role>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
}

impl NewUser {
    pub fn new(login: &str, password: &str) -> Self {
        NewUser {
            login: login.to_string(),
            password: password.to_string(),
            roles: None,
            desc: None,
        }
    }

    pub fn with_roles(mut self, roles: Vec<Role>) -> Self {
        self.roles = Some(roles);
        self
    }

    pub fn with_desc(mut self, desc: &str) -> Self {
        self.desc = Some(desc.to_string());
        self
    }
}

/// Changes to an existing account. Any subset of the `new_*` fields may be set.
///
/// Setting `new_roles` replaces every role the account had before.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserUpdate {
    pub login: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_login: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_roles: Option<Vec<Role>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_desc: Option<String>,
}

impl UserUpdate {
    pub fn new(login: &str) -> Self {
        UserUpdate {
            login: login.to_string(),
            new_login: None,
            new_password: None,
            new_roles: None,
            new_desc: None,
        }
    }

    pub fn with_login(mut self, login: &str) -> Self {
        self.new_login = Some(login.to_string());
        self
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.new_password = Some(password.to_string());
        self
    }

    pub fn with_roles(mut self, roles: Vec<Role>) -> Self {
        self.new_roles = Some(roles);
        self
    }

    pub fn with_desc(mut self, desc: &str) -> Self {
        self.new_desc = Some(desc.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserLogin {
    pub login: String,
}

impl UserLogin {
    pub fn new(login: &str) -> Self {
        UserLogin {
            login: login.to_string(),
        }
    }
}

// Hexadecimal ID of a cell, base station or tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceId {
    pub id: String,
}

impl DeviceId {
    pub fn new(id: &str) -> Self {
        DeviceId { id: id.to_string() }
    }
}

/// A cell, addressed through its master base station.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cell {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    pub ip_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl Cell {
    pub fn new(id: &str, ip_address: &str) -> Self {
        Cell {
            id: id.to_string(),
            desc: None,
            ip_address: ip_address.to_string(),
            port: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_desc(mut self, desc: &str) -> Self {
        self.desc = Some(desc.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellUpdate {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl CellUpdate {
    pub fn new(id: &str) -> Self {
        CellUpdate {
            id: id.to_string(),
            desc: None,
            ip_address: None,
            port: None,
        }
    }
}

const MAX_ORIENTATION: i64 = 359;

fn check_orientation(orientation: i64, errors: &mut Vec<Violation>) -> u16 {
    if (0..=MAX_ORIENTATION).contains(&orientation) {
        orientation as u16
    } else {
        errors.push(Violation::out_of_range(
            vec!["bs".into(), "orientation".into()],
            format!("input should be between 0 and {}", MAX_ORIENTATION),
            Value::from(orientation),
        ));
        0
    }
}

fn check_position(position: &[f64], errors: &mut Vec<Violation>) {
    if position.len() != 3 {
        errors.push(Violation::wrong_type(
            vec!["bs".into(), "position".into()],
            "position should be [x, y, z]",
            Value::from(position.to_vec()),
        ));
    }
}

/// A base station. Built through [`BaseStation::new`], which enforces the
/// `[x, y, z]` position and the 0..=359 degree mounting orientation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaseStation {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    desc: Option<String>,
    position: Vec<f64>,
    orientation: u16,
    cell_id: String,
}

impl BaseStation {
    pub fn new(
        id: &str,
        cell_id: &str,
        position: Vec<f64>,
        orientation: i64,
        desc: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let mut errors = Vec::new();
        check_position(&position, &mut errors);
        let orientation = check_orientation(orientation, &mut errors);
        if !errors.is_empty() {
            return Err(ValidationError::new(errors));
        }
        Ok(BaseStation {
            id: id.to_string(),
            desc: desc.map(str::to_string),
            position,
            orientation,
            cell_id: cell_id.to_string(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn position(&self) -> &[f64] {
        &self.position
    }

    pub fn orientation(&self) -> u16 {
        self.orientation
    }
}

/// Base station update; the position may be left unchanged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaseStationUpdate {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    desc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    position: Option<Vec<f64>>,
    orientation: u16,
    cell_id: String,
}

impl BaseStationUpdate {
    pub fn new(
        id: &str,
        cell_id: &str,
        position: Option<Vec<f64>>,
        orientation: i64,
        desc: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let mut errors = Vec::new();
        if let Some(ref position) = position {
            check_position(position, &mut errors);
        }
        let orientation = check_orientation(orientation, &mut errors);
        if !errors.is_empty() {
            return Err(ValidationError::new(errors));
        }
        Ok(BaseStationUpdate {
            id: id.to_string(),
            desc: desc.map(str::to_string),
            position,
            orientation,
            cell_id: cell_id.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tag {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<TagMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<f64>,
}

impl Tag {
    pub fn new(id: &str) -> Self {
        Tag {
            id: id.to_string(),
            desc: None,
            mode: None,
            alt: None,
        }
    }

    pub fn with_mode(mut self, mode: TagMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_alt(mut self, alt: f64) -> Self {
        self.alt = Some(alt);
        self
    }

    pub fn with_desc(mut self, desc: &str) -> Self {
        self.desc = Some(desc.to_string());
        self
    }
}

/// Channels to join or leave: a bare name for one, a list for several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ChannelSelection {
    One(Channel),
    Many(Vec<Channel>),
}

impl ChannelSelection {
    pub fn new(channels: Vec<Channel>) -> Result<Self, ValidationError> {
        match channels.len() {
            0 => Err(Violation::missing(vec!["channel".into()]).into()),
            1 => Ok(ChannelSelection::One(channels[0])),
            _ => Ok(ChannelSelection::Many(channels)),
        }
    }

    /// The server answers a multi-channel request with one frame per channel.
    pub fn is_multi(&self) -> bool {
        matches!(self, ChannelSelection::Many(_))
    }

    pub fn channels(&self) -> &[Channel] {
        match self {
            ChannelSelection::One(channel) => std::slice::from_ref(channel),
            ChannelSelection::Many(channels) => channels,
        }
    }
}

// ---------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------

/// One request message. The wire name goes in the `request` field; the
/// client adds `msgid` when the request is sent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "request", rename_all = "camelCase")]
pub enum Request {
    // Authentication and session control
    Login { user: String, password: String },
    Logout,
    Ping,

    // User accounts
    CreateUser { user: NewUser },
    UpdateUser { user: UserUpdate },
    RemoveUser { user: UserLogin },
    ListUsers,
    GetUser { user: UserLogin },

    // System configuration
    SetCoordinates { origin: [f64; 3], orientation: f64 },
    SetAltitude { altitude: f64 },
    GetConfig { item: String },
    ResetAllConfig,

    // Cells
    AddCell { cell: Cell },
    UpdateCell { cell: CellUpdate },
    RemoveCell { cell: DeviceId },
    RemoveAllCells,
    ListCells,

    // Base stations
    #[serde(rename = "addBS")]
    AddBaseStation { bs: BaseStation },
    #[serde(rename = "updateBS")]
    UpdateBaseStation { bs: BaseStationUpdate },
    #[serde(rename = "listBS")]
    ListBaseStations,
    #[serde(rename = "removeBS")]
    RemoveBaseStation { bs: DeviceId },
    #[serde(rename = "removeAllBS")]
    RemoveAllBaseStations {
        #[serde(skip_serializing_if = "Option::is_none")]
        cell: Option<DeviceId>,
    },

    // Tags
    AddTag { tag: Tag },
    UpdateTag { tag: Tag },
    ListTags,
    RemoveTag { tag: DeviceId },
    #[serde(rename = "removeAllTag")]
    RemoveAllTags,

    // Channel subscriptions
    JoinChannel { channel: ChannelSelection },
    ListChannels,
    LeaveChannel { channel: ChannelSelection },
}

#[derive(Serialize)]
struct Envelope<'a> {
    #[serde(flatten)]
    request: &'a Request,
    msgid: u64,
}

impl Request {
    pub fn login(username: &str, password: &str) -> Self {
        Request::Login {
            user: username.to_string(),
            password: password.to_string(),
        }
    }

    /// Wire name of the request, as sent in the `request` field.
    pub fn name(&self) -> &'static str {
        match self {
            Request::Login { .. } => "login",
            Request::Logout => "logout",
            Request::Ping => "ping",
            Request::CreateUser { .. } => "createUser",
            Request::UpdateUser { .. } => "updateUser",
            Request::RemoveUser { .. } => "removeUser",
            Request::ListUsers => "listUsers",
            Request::GetUser { .. } => "getUser",
            Request::SetCoordinates { .. } => "setCoordinates",
            Request::SetAltitude { .. } => "setAltitude",
            Request::GetConfig { .. } => "getConfig",
            Request::ResetAllConfig => "resetAllConfig",
            Request::AddCell { .. } => "addCell",
            Request::UpdateCell { .. } => "updateCell",
            Request::RemoveCell { .. } => "removeCell",
            Request::RemoveAllCells => "removeAllCells",
            Request::ListCells => "listCells",
            Request::AddBaseStation { .. } => "addBS",
            Request::UpdateBaseStation { .. } => "updateBS",
            Request::ListBaseStations => "listBS",
            Request::RemoveBaseStation { .. } => "removeBS",
            Request::RemoveAllBaseStations { .. } => "removeAllBS",
            Request::AddTag { .. } => "addTag",
            Request::UpdateTag { .. } => "updateTag",
            Request::ListTags => "listTags",
            Request::RemoveTag { .. } => "removeTag",
            Request::RemoveAllTags => "removeAllTag",
            Request::JoinChannel { .. } => "joinChannel",
            Request::ListChannels => "listChannels",
            Request::LeaveChannel { .. } => "leaveChannel",
        }
    }

    /// Serialize with `msgid` attached, as one JSON object.
    pub fn to_json(&self, msgid: u64) -> serde_json::Result<String> {
        serde_json::to_string(&Envelope {
            request: self,
            msgid,
        })
    }
}

// ---------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------

/// Body of an untyped `element` response: every field except `response`
/// and `msgid`.
pub type Body = Map<String, Value>;

impl FromFields for Body {
    fn from_fields(fields: &mut Fields<'_>) -> Option<Self> {
        Some(fields.remaining(&["response", "msgid"]))
    }
}

/// One response frame.
///
/// Server-reported failures arrive as [`Response::Error`]; they are data,
/// not a client error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "response", rename_all = "lowercase")]
pub enum Response<T = Body> {
    Ack {
        msgid: u64,
    },
    Begin {
        msgid: u64,
    },
    Element {
        msgid: u64,
        #[serde(flatten)]
        body: T,
    },
    End {
        msgid: u64,
    },
    Error {
        msgid: u64,
        code: i64,
        desc: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ResponseKind {
    Ack,
    Begin,
    Element,
    End,
    Error,
}

impl<T: FromFields> FromFields for Response<T> {
    fn from_fields(fields: &mut Fields<'_>) -> Option<Self> {
        let kind = fields.required::<ResponseKind>("response");
        let msgid = fields.optional::<u64>("msgid").map(|id| id.unwrap_or(0));
        match kind? {
            ResponseKind::Ack => Some(Response::Ack { msgid: msgid? }),
            ResponseKind::Begin => Some(Response::Begin { msgid: msgid? }),
            ResponseKind::End => Some(Response::End { msgid: msgid? }),
            ResponseKind::Element => {
                let body = T::from_fields(fields);
                Some(Response::Element {
                    msgid: msgid?,
                    body: body?,
                })
            }
            ResponseKind::Error => {
                let code = fields.required("code");
                let desc = fields.required("desc");
                Some(Response::Error {
                    msgid: msgid?,
                    code: code?,
                    desc: desc?,
                })
            }
        }
    }
}

impl<T> Response<T> {
    pub fn msgid(&self) -> u64 {
        match self {
            Response::Ack { msgid }
            | Response::Begin { msgid }
            | Response::Element { msgid, .. }
            | Response::End { msgid }
            | Response::Error { msgid, .. } => *msgid,
        }
    }

    pub fn is_ack(&self) -> bool {
        matches!(self, Response::Ack { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }

    /// Final frame of a single-element exchange. An `end` closes a reply
    /// that carried no element.
    pub fn ends_single(&self) -> bool {
        matches!(
            self,
            Response::Ack { .. }
                | Response::Element { .. }
                | Response::End { .. }
                | Response::Error { .. }
        )
    }

    /// Final frame of a multi-element exchange.
    pub fn ends_multi(&self) -> bool {
        matches!(
            self,
            Response::Ack { .. } | Response::End { .. } | Response::Error { .. }
        )
    }

    pub fn element(&self) -> Option<&T> {
        match self {
            Response::Element { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn into_element(self) -> Option<T> {
        match self {
            Response::Element { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Element bodies out of a multi-element response, in arrival order.
pub fn elements<T>(frames: &[Response<T>]) -> impl Iterator<Item = &T> {
    frames.iter().filter_map(Response::element)
}

/// A user account as reported by `getUser` and `listUsers`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserAccount {
    pub id: i64,
    pub login: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<Role>>,
}

impl FromFields for UserAccount {
    fn from_fields(fields: &mut Fields<'_>) -> Option<Self> {
        let id = fields.required("id");
        let login = fields.required("login");
        let desc = fields.optional("desc");
        let roles = fields.optional("roles");
        Some(UserAccount {
            id: id?,
            login: login?,
            desc: desc?,
            roles: roles?,
        })
    }
}

/// `element` body carrying one user account under the `user` key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserElement {
    pub user: UserAccount,
}

impl FromFields for UserElement {
    fn from_fields(fields: &mut Fields<'_>) -> Option<Self> {
        let user = fields.required_nested("user");
        Some(UserElement { user: user? })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::{validate, ViolationKind};
    use serde_json::json;

    fn wire(request: &Request, msgid: u64) -> Value {
        serde_json::from_str(&request.to_json(msgid).unwrap()).unwrap()
    }

    #[test]
    fn login_round_trip_has_no_extra_fields() {
        let value = wire(&Request::login("alice", "secret"), 1);
        assert_eq!(
            value,
            json!({"request": "login", "user": "alice", "password": "secret", "msgid": 1})
        );
        let map = value.as_object().unwrap();
        assert_eq!(map["user"], "alice");
        assert_eq!(map["password"], "secret");
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn unit_requests_carry_only_name_and_msgid() {
        assert_eq!(wire(&Request::Ping, 7), json!({"request": "ping", "msgid": 7}));
        assert_eq!(wire(&Request::ListBaseStations, 2), json!({"request": "listBS", "msgid": 2}));
        assert_eq!(
            wire(&Request::RemoveAllTags, 3),
            json!({"request": "removeAllTag", "msgid": 3})
        );
    }

    #[test]
    fn configuration_requests_nest_their_payload() {
        let coordinates = Request::SetCoordinates {
            origin: [60.17, 24.94, 12.5],
            orientation: 15.0,
        };
        assert_eq!(
            wire(&coordinates, 4),
            json!({"request": "setCoordinates", "origin": [60.17, 24.94, 12.5], "orientation": 15.0, "msgid": 4})
        );

        let cell = Request::AddCell {
            cell: Cell::new("c0de", "192.168.1.10").with_port(5000),
        };
        assert_eq!(
            wire(&cell, 5),
            json!({"request": "addCell", "cell": {"id": "c0de", "ip_address": "192.168.1.10", "port": 5000}, "msgid": 5})
        );

        let tag = Request::UpdateTag {
            tag: Tag::new("0a01").with_mode(TagMode::from(3)).with_alt(1.2),
        };
        assert_eq!(
            wire(&tag, 6),
            json!({"request": "updateTag", "tag": {"id": "0a01", "mode": 3, "alt": 1.2}, "msgid": 6})
        );
    }

    #[test]
    fn name_matches_serialized_request_field() {
        let requests = vec![
            Request::Logout,
            Request::ListUsers,
            Request::ResetAllConfig,
            Request::RemoveAllCells,
            Request::RemoveAllBaseStations { cell: None },
            Request::ListChannels,
            Request::GetConfig { item: "altitude".into() },
        ];
        for request in requests {
            assert_eq!(wire(&request, 1)["request"], request.name());
        }
    }

    #[test]
    fn user_update_omits_unset_fields() {
        let update = UserUpdate::new("bob").with_desc("");
        let value = wire(&Request::UpdateUser { user: update }, 4);
        assert_eq!(
            value,
            json!({"request": "updateUser", "user": {"login": "bob", "new_desc": ""}, "msgid": 4})
        );
    }

    #[test]
    fn user_create_keeps_supplied_fields_unchanged() {
        let user = NewUser::new("carol", "pw").with_roles(vec![Role::Admin, Role::User]);
        let value = wire(&Request::CreateUser { user }, 1);
        assert_eq!(
            value["user"],
            json!({"login": "carol", "password": "pw", "roles": ["admin", "user"]})
        );
    }

    #[test]
    fn remove_all_base_stations_optionally_names_cell() {
        let all = wire(&Request::RemoveAllBaseStations { cell: None }, 1);
        assert!(all.get("cell").is_none());
        let one = wire(
            &Request::RemoveAllBaseStations {
                cell: Some(DeviceId::new("c1")),
            },
            2,
        );
        assert_eq!(one["cell"], json!({"id": "c1"}));
    }

    #[test]
    fn channel_selection_shape_depends_on_count() {
        let one = ChannelSelection::new(vec![Channel::Solution]).unwrap();
        assert!(!one.is_multi());
        assert_eq!(wire(&Request::JoinChannel { channel: one }, 1)["channel"], "solution");

        let many = ChannelSelection::new(vec![Channel::Measurements, Channel::Solution]).unwrap();
        assert!(many.is_multi());
        assert_eq!(
            wire(&Request::LeaveChannel { channel: many }, 1)["channel"],
            json!(["measurements", "solution"])
        );

        let err = ChannelSelection::new(Vec::new()).unwrap_err();
        assert_eq!(err.errors[0].kind, ViolationKind::Missing);
    }

    #[test]
    fn base_station_reports_every_violation() {
        let err = BaseStation::new("bs1", "c1", vec![1.0, 2.0], 400, None).unwrap_err();
        let fields: Vec<String> = err.errors.iter().map(Violation::field).collect();
        assert_eq!(fields, vec!["bs.position", "bs.orientation"]);

        let bs = BaseStation::new("bs1", "c1", vec![1.0, 2.0, 3.0], 359, Some("door")).unwrap();
        assert_eq!(bs.orientation(), 359);
        let value = wire(&Request::AddBaseStation { bs }, 1);
        assert_eq!(
            value["bs"],
            json!({"id": "bs1", "desc": "door", "position": [1.0, 2.0, 3.0], "orientation": 359, "cell_id": "c1"})
        );
    }

    #[test]
    fn base_station_update_may_leave_position() {
        let bs = BaseStationUpdate::new("bs1", "c1", None, 0, None).unwrap();
        let value = wire(&Request::UpdateBaseStation { bs }, 1);
        assert_eq!(value["bs"], json!({"id": "bs1", "orientation": 0, "cell_id": "c1"}));
        assert!(BaseStationUpdate::new("bs1", "c1", None, -1, None).is_err());
    }

    #[test]
    fn parses_ack_and_error() {
        let ack: Response = validate(&json!({"response": "ack", "msgid": 3})).unwrap();
        assert_eq!(ack, Response::Ack { msgid: 3 });
        assert!(ack.ends_single() && ack.ends_multi());

        let err: Response = validate(
            &json!({"response": "error", "msgid": 4, "code": 401, "desc": "unauthorized"}),
        )
        .unwrap();
        assert!(err.is_error());
        assert_eq!(err.msgid(), 4);
    }

    #[test]
    fn end_closes_both_kinds_of_exchange() {
        let end: Response = validate(&json!({"response": "end", "msgid": 6})).unwrap();
        assert!(end.ends_single());
        assert!(end.ends_multi());

        let begin: Response = validate(&json!({"response": "begin", "msgid": 6})).unwrap();
        assert!(!begin.ends_single());
        assert!(!begin.ends_multi());
    }

    #[test]
    fn missing_msgid_defaults_to_zero() {
        let ack: Response = validate(&json!({"response": "ack"})).unwrap();
        assert_eq!(ack.msgid(), 0);
    }

    #[test]
    fn element_body_keeps_remaining_fields() {
        let frame = json!({"response": "element", "msgid": 5, "id": "0a0b"});
        let element: Response = validate(&frame).unwrap();
        assert_eq!(element.element().unwrap()["id"], "0a0b");
        assert!(element.ends_single());
        assert!(!element.ends_multi());
        assert_eq!(serde_json::to_value(&element).unwrap(), frame);
    }

    #[test]
    fn user_element_reports_each_bad_field() {
        let frame = json!({
            "response": "element",
            "msgid": 1,
            "user": {"id": "x", "login": 5, "roles": ["boss"]}
        });
        let err = validate::<Response<UserElement>>(&frame).unwrap_err();
        let fields: Vec<String> = err.errors.iter().map(Violation::field).collect();
        assert_eq!(fields, vec!["user.id", "user.login", "user.roles"]);
        assert_eq!(err.input, Some(frame));
    }

    #[test]
    fn error_frame_needs_code_and_desc() {
        let err = validate::<Response>(&json!({"response": "error", "msgid": 1})).unwrap_err();
        assert_eq!(err.errors.len(), 2);
        assert!(err.errors.iter().all(|v| v.kind == ViolationKind::Missing));
    }

    #[test]
    fn unknown_response_kind_is_rejected() {
        let err = validate::<Response>(&json!({"response": "maybe"})).unwrap_err();
        assert_eq!(err.errors[0].field(), "response");
        assert_eq!(err.errors[0].kind, ViolationKind::NotInSet);
    }

    #[test]
    fn elements_skip_brackets() {
        let frames: Vec<Response<i32>> = vec![
            Response::Begin { msgid: 1 },
            Response::Element { msgid: 1, body: 10 },
            Response::Element { msgid: 1, body: 20 },
            Response::End { msgid: 1 },
        ];
        assert_eq!(elements(&frames).copied().collect::<Vec<_>>(), vec![10, 20]);
    }
}
