// client: EXL JSON API client library for the Exafore UWB Location Engine
//
// One client owns at most one session. Every operation sends one request and
// blocks until its response arrives; notifications are drained separately.
pub mod cli;
mod config;
mod error;
mod logfile;
mod session;

pub use config::{ClientConfig, TransportKind, DEFAULT_MAX_MESSAGE_LEN, DEFAULT_PORT};
pub use error::ClientError;
pub use logfile::{NotificationLog, DEFAULT_LOG_FILE};

// Re-export message models and transports
pub use exl_core::*;
pub use exl_transport::{TcpTransport, TlsOptions, TlsTransport, Transport};

use serde_json::Value;
use session::Session;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Connected,
    Authenticated,
}

pub struct ExlClient {
    config: ClientConfig,
    session: Option<Session>,
    authenticated: bool,
    message_id: u64,
}

fn is_notification(frame: &Value) -> bool {
    frame.get("response").is_none() && frame.get("channel").is_some()
}

// Raw `response` kind, readable even when the frame fails validation
fn frame_kind(frame: &Value) -> Option<&str> {
    frame.get("response").and_then(Value::as_str)
}

impl ExlClient {
    pub fn new(config: ClientConfig) -> Self {
        ExlClient {
            config,
            session: None,
            authenticated: false,
            message_id: 0,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> ClientState {
        match (&self.session, self.authenticated) {
            (None, _) => ClientState::Disconnected,
            (Some(_), false) => ClientState::Connected,
            (Some(_), true) => ClientState::Authenticated,
        }
    }

    /// `msgid` of the most recent request on this session, 0 before the first.
    pub fn last_msgid(&self) -> u64 {
        self.message_id
    }

    // -----------------------------------------------------------------
    // Connection
    // -----------------------------------------------------------------

    /// Open a session using the configured transport.
    pub fn connect(&mut self) -> Result<(), ClientError> {
        let transport: Box<dyn Transport> = match self.config.transport {
            TransportKind::Tls(options) => {
                Box::new(TlsTransport::new(&self.config.host, self.config.port, options))
            }
            TransportKind::Tcp => Box::new(TcpTransport::new(&self.config.host, self.config.port)),
        };
        self.connect_with(transport)
    }

    /// Open a session over the given transport, connecting it if needed.
    ///
    /// Any existing session is closed first, and message ids restart at 1.
    pub fn connect_with(&mut self, mut transport: Box<dyn Transport>) -> Result<(), ClientError> {
        self.disconnect();
        if !transport.is_connected() {
            transport.connect()?;
        }
        self.session = Some(Session::new(transport, self.config.max_message_len));
        self.message_id = 0;
        info!(host = %self.config.host, port = self.config.port, "connected to EXL server");
        Ok(())
    }

    /// Close the session. Safe to call in any state, any number of times.
    pub fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.close() {
                debug!(error = %e, "error while closing session");
            }
            info!(host = %self.config.host, "disconnected from EXL server");
        }
        self.authenticated = false;
    }

    // -----------------------------------------------------------------
    // Send / receive
    // -----------------------------------------------------------------

    fn send(&mut self, request: &Request) -> Result<u64, ClientError> {
        let session = self.session.as_mut().ok_or(ClientError::NotConnected)?;
        self.message_id += 1;
        let msgid = self.message_id;

        let mut payload = request.to_json(msgid).map_err(ClientError::Serialize)?;
        if self.config.debug {
            println!("{}", payload);
        }
        debug!(msgid, request = request.name(), "sending request");
        payload.push('\n');
        session.send(payload.as_bytes())?;
        Ok(msgid)
    }

    fn next_frame(&mut self) -> Result<Value, ClientError> {
        let session = self.session.as_mut().ok_or(ClientError::NotConnected)?;
        let frame = session.next_frame()?;
        if self.config.debug {
            println!("{}", frame);
        }
        debug!(frame = %frame, "received frame");
        Ok(frame)
    }

    // Next frame that is not a notification; notifications are kept for later.
    fn next_response_frame(&mut self) -> Result<Value, ClientError> {
        loop {
            let frame = self.next_frame()?;
            if !is_notification(&frame) {
                return Ok(frame);
            }
            trace!("queueing notification received while awaiting a response");
            if let Some(session) = self.session.as_mut() {
                session.queue_notification(frame);
            }
        }
    }

    fn parse_response<T: FromFields>(frame: &Value) -> Result<Response<T>, ClientError> {
        validate::<Response<T>>(frame).map_err(|e| {
            warn!(error = %e, "response failed validation");
            ClientError::Validation(e)
        })
    }

    /// Receive one single-element response: `ack`, `element`, `end` or `error`.
    ///
    /// A frame that fails validation does not stop the read early; the rest
    /// of the response is consumed first so the next request starts in step.
    pub fn recv_response<T: FromFields>(&mut self) -> Result<Response<T>, ClientError> {
        let mut failure = None;
        loop {
            let frame = self.next_response_frame()?;
            match Self::parse_response::<T>(&frame) {
                Ok(response) if response.ends_single() => {
                    return match failure {
                        Some(e) => Err(e),
                        None => Ok(response),
                    };
                }
                Ok(_) => {}
                Err(e) => {
                    let e = failure.take().unwrap_or(e);
                    if !matches!(frame_kind(&frame), Some("begin")) {
                        return Err(e);
                    }
                    failure = Some(e);
                }
            }
        }
    }

    /// Receive a multi-element response: every frame up to and including
    /// the closing `end`, `ack` or `error`. The first validation failure is
    /// returned once the closing frame has been read.
    pub fn recv_elements<T: FromFields>(&mut self) -> Result<Vec<Response<T>>, ClientError> {
        let mut frames = Vec::new();
        let mut failure = None;
        loop {
            let frame = self.next_response_frame()?;
            let done = match Self::parse_response::<T>(&frame) {
                Ok(response) => {
                    let done = response.ends_multi();
                    frames.push(response);
                    done
                }
                Err(e) => {
                    failure.get_or_insert(e);
                    !matches!(frame_kind(&frame), Some("begin" | "element"))
                }
            };
            if done {
                debug!(frames = frames.len(), "received multi-element response");
                return match failure {
                    Some(e) => Err(e),
                    None => Ok(frames),
                };
            }
        }
    }

    fn request<T: FromFields>(&mut self, request: Request) -> Result<Response<T>, ClientError> {
        self.send(&request)?;
        self.recv_response()
    }

    fn request_all<T: FromFields>(&mut self, request: Request) -> Result<Vec<Response<T>>, ClientError> {
        self.send(&request)?;
        self.recv_elements()
    }

    // -----------------------------------------------------------------
    // Authentication and session control
    // -----------------------------------------------------------------

    /// Authenticate. Only an `ack` moves the client to `Authenticated`.
    pub fn login(&mut self, username: &str, password: &str) -> Result<Response, ClientError> {
        let response = self.request(Request::login(username, password))?;
        if response.is_ack() {
            self.authenticated = true;
        }
        Ok(response)
    }

    /// End the login session and leave every joined channel. The connection
    /// stays open, so another user may log in.
    pub fn logout(&mut self) -> Result<Response, ClientError> {
        let response = self.request(Request::Logout)?;
        if response.is_ack() {
            self.authenticated = false;
        }
        Ok(response)
    }

    pub fn ping(&mut self) -> Result<Response, ClientError> {
        self.request(Request::Ping)
    }

    // -----------------------------------------------------------------
    // User accounts
    // -----------------------------------------------------------------

    pub fn user_create(&mut self, user: NewUser) -> Result<Response, ClientError> {
        self.request(Request::CreateUser { user })
    }

    pub fn user_update(&mut self, update: UserUpdate) -> Result<Response, ClientError> {
        self.request(Request::UpdateUser { user: update })
    }

    pub fn user_remove(&mut self, username: &str) -> Result<Response, ClientError> {
        self.request(Request::RemoveUser {
            user: UserLogin::new(username),
        })
    }

    pub fn user_list(&mut self) -> Result<Vec<Response<UserElement>>, ClientError> {
        self.request_all(Request::ListUsers)
    }

    pub fn user_get(&mut self, username: &str) -> Result<Response<UserElement>, ClientError> {
        self.request(Request::GetUser {
            user: UserLogin::new(username),
        })
    }

    // -----------------------------------------------------------------
    // System configuration
    // -----------------------------------------------------------------

    /// Place the local XYZ frame in WGS84: origin at `lat`/`lon`/`alt`, X axis
    /// rotated `angle` degrees anti-clockwise from East.
    pub fn config_coordinates(
        &mut self,
        lat: f64,
        lon: f64,
        alt: f64,
        angle: f64,
    ) -> Result<Response, ClientError> {
        self.request(Request::SetCoordinates {
            origin: [lat, lon, alt],
            orientation: angle,
        })
    }

    pub fn config_altitude(&mut self, altitude: f64) -> Result<Response, ClientError> {
        self.request(Request::SetAltitude { altitude })
    }

    /// Query one configuration item, `coordinates` or `altitude`.
    pub fn config_get(&mut self, item: &str) -> Result<Response, ClientError> {
        self.request(Request::GetConfig {
            item: item.to_string(),
        })
    }

    pub fn config_reset(&mut self) -> Result<Response, ClientError> {
        self.request(Request::ResetAllConfig)
    }

    // -----------------------------------------------------------------
    // Cells
    // -----------------------------------------------------------------

    pub fn cell_add(&mut self, cell: Cell) -> Result<Response, ClientError> {
        self.request(Request::AddCell { cell })
    }

    pub fn cell_update(&mut self, cell: CellUpdate) -> Result<Response, ClientError> {
        self.request(Request::UpdateCell { cell })
    }

    pub fn cell_remove(&mut self, cell_id: &str) -> Result<Response, ClientError> {
        self.request(Request::RemoveCell {
            cell: DeviceId::new(cell_id),
        })
    }

    pub fn cell_remove_all(&mut self) -> Result<Response, ClientError> {
        self.request(Request::RemoveAllCells)
    }

    pub fn cell_list(&mut self) -> Result<Vec<Response>, ClientError> {
        self.request_all(Request::ListCells)
    }

    // -----------------------------------------------------------------
    // Base stations
    // -----------------------------------------------------------------

    pub fn bs_add(&mut self, bs: BaseStation) -> Result<Response, ClientError> {
        self.request(Request::AddBaseStation { bs })
    }

    pub fn bs_update(&mut self, bs: BaseStationUpdate) -> Result<Response, ClientError> {
        self.request(Request::UpdateBaseStation { bs })
    }

    pub fn bs_list(&mut self) -> Result<Vec<Response>, ClientError> {
        self.request_all(Request::ListBaseStations)
    }

    pub fn bs_remove(&mut self, bs_id: &str) -> Result<Response, ClientError> {
        self.request(Request::RemoveBaseStation {
            bs: DeviceId::new(bs_id),
        })
    }

    /// Remove every base station, or only those of `cell_id`.
    pub fn bs_remove_all(&mut self, cell_id: Option<&str>) -> Result<Response, ClientError> {
        self.request(Request::RemoveAllBaseStations {
            cell: cell_id.map(DeviceId::new),
        })
    }

    // -----------------------------------------------------------------
    // Tags
    // -----------------------------------------------------------------

    pub fn tag_add(&mut self, tag: Tag) -> Result<Response, ClientError> {
        self.request(Request::AddTag { tag })
    }

    pub fn tag_update(&mut self, tag: Tag) -> Result<Response, ClientError> {
        self.request(Request::UpdateTag { tag })
    }

    pub fn tag_list(&mut self) -> Result<Vec<Response>, ClientError> {
        self.request_all(Request::ListTags)
    }

    pub fn tag_remove(&mut self, tag_id: &str) -> Result<Response, ClientError> {
        self.request(Request::RemoveTag {
            tag: DeviceId::new(tag_id),
        })
    }

    pub fn tag_remove_all(&mut self) -> Result<Response, ClientError> {
        self.request(Request::RemoveAllTags)
    }

    // -----------------------------------------------------------------
    // Channel subscriptions
    // -----------------------------------------------------------------

    /// Join channels. A single channel gets one response frame; several get
    /// a multi-element response.
    pub fn channel_join(&mut self, channels: &ChannelSelection) -> Result<Vec<Response>, ClientError> {
        self.subscription(Request::JoinChannel {
            channel: channels.clone(),
        })
    }

    pub fn channel_leave(&mut self, channels: &ChannelSelection) -> Result<Vec<Response>, ClientError> {
        self.subscription(Request::LeaveChannel {
            channel: channels.clone(),
        })
    }

    /// Channels this session has joined.
    pub fn channel_list(&mut self) -> Result<Response, ClientError> {
        self.request(Request::ListChannels)
    }

    fn subscription(&mut self, request: Request) -> Result<Vec<Response>, ClientError> {
        let multi = matches!(
            &request,
            Request::JoinChannel { channel } | Request::LeaveChannel { channel } if channel.is_multi()
        );
        if multi {
            self.request_all(request)
        } else {
            Ok(vec![self.request(request)?])
        }
    }

    // -----------------------------------------------------------------
    // Notifications
    // -----------------------------------------------------------------

    /// Receive the next notification, without sending anything first.
    ///
    /// Notifications queued while awaiting earlier responses come first.
    pub fn recv_notification(&mut self) -> Result<Notification, ClientError> {
        self.next_notification().map(|(notification, _)| notification)
    }

    /// Receive one notification and append it to `log` exactly as received.
    pub fn drain_notification(&mut self, log: &mut NotificationLog) -> Result<Notification, ClientError> {
        let (notification, frame) = self.next_notification()?;
        log.append(&frame).map_err(ClientError::Log)?;
        Ok(notification)
    }

    fn next_notification(&mut self) -> Result<(Notification, Value), ClientError> {
        let queued = self.session.as_mut().and_then(Session::pop_notification);
        let frame = match queued {
            Some(frame) => frame,
            None => self.next_frame()?,
        };
        match validate::<Notification>(&frame) {
            Ok(notification) => Ok((notification, frame)),
            Err(e) => {
                warn!(error = %e, "notification failed validation");
                Err(ClientError::Validation(e))
            }
        }
    }
}

impl Drop for ExlClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::ScriptedTransport;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn client_with(reads: &[&str]) -> (ExlClient, Arc<Mutex<Vec<u8>>>) {
        let transport = ScriptedTransport::new(reads);
        let written = Arc::clone(&transport.written);
        let mut client = ExlClient::new(ClientConfig::new("127.0.0.1", DEFAULT_PORT));
        client.connect_with(Box::new(transport)).unwrap();
        (client, written)
    }

    fn sent_requests(written: &Arc<Mutex<Vec<u8>>>) -> Vec<Value> {
        let bytes = written.lock().unwrap();
        std::str::from_utf8(&bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn requests_without_session_are_rejected() {
        let mut client = ExlClient::new(ClientConfig::new("127.0.0.1", DEFAULT_PORT));
        assert!(matches!(client.ping(), Err(ClientError::NotConnected)));
        assert!(matches!(client.recv_notification(), Err(ClientError::NotConnected)));
        assert_eq!(client.last_msgid(), 0);
    }

    #[test]
    fn disconnect_is_idempotent() {
        let mut client = ExlClient::new(ClientConfig::new("127.0.0.1", DEFAULT_PORT));
        client.disconnect();
        client.disconnect();
        assert_eq!(client.state(), ClientState::Disconnected);

        let (mut client, _) = client_with(&[]);
        assert_eq!(client.state(), ClientState::Connected);
        client.disconnect();
        client.disconnect();
        assert_eq!(client.state(), ClientState::Disconnected);
    }

    #[test]
    fn msgids_count_up_from_one() {
        let (mut client, written) = client_with(&[
            "{\"response\":\"ack\",\"msgid\":1}",
            "{\"response\":\"ack\",\"msgid\":2}",
            "{\"response\":\"ack\",\"msgid\":3}",
        ]);
        client.ping().unwrap();
        client.ping().unwrap();
        client.config_reset().unwrap();

        let ids: Vec<u64> = sent_requests(&written)
            .iter()
            .map(|r| r["msgid"].as_u64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(client.last_msgid(), 3);
    }

    #[test]
    fn msgid_advances_even_when_receive_fails() {
        let (mut client, _) = client_with(&["not json\n"]);
        assert!(matches!(client.ping(), Err(ClientError::Protocol(_))));
        assert_eq!(client.last_msgid(), 1);
    }

    #[test]
    fn login_tracks_authentication() {
        let (mut client, written) = client_with(&[
            "{\"response\":\"error\",\"msgid\":1,\"code\":401,\"desc\":\"bad credentials\"}",
            "{\"response\":\"ack\",\"msgid\":2}",
            "{\"response\":\"ack\",\"msgid\":3}",
        ]);

        let rejected = client.login("alice", "wrong").unwrap();
        assert!(rejected.is_error());
        assert_eq!(client.state(), ClientState::Connected);

        client.login("alice", "secret").unwrap();
        assert_eq!(client.state(), ClientState::Authenticated);

        client.logout().unwrap();
        assert_eq!(client.state(), ClientState::Connected);

        let sent = sent_requests(&written);
        assert_eq!(
            sent[1],
            json!({"request": "login", "user": "alice", "password": "secret", "msgid": 2})
        );
        assert_eq!(sent[2], json!({"request": "logout", "msgid": 3}));
    }

    #[test]
    fn invalid_response_is_returned_as_validation_error() {
        let (mut client, _) = client_with(&[
            "{\"response\":\"element\",\"msgid\":1,\"user\":{\"id\":\"seven\",\"login\":false}}",
        ]);
        match client.user_get("bob") {
            Err(ClientError::Validation(e)) => {
                assert_eq!(e.errors.len(), 2);
                assert_eq!(e.input.unwrap()["user"]["id"], "seven");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(client.state(), ClientState::Connected);
    }

    #[test]
    fn bad_list_element_is_reported_after_the_whole_list() {
        let (mut client, _) = client_with(&[concat!(
            "{\"response\":\"begin\",\"msgid\":1}\n",
            "{\"response\":\"element\",\"msgid\":1,\"user\":{\"id\":\"bad\",\"login\":\"alice\"}}\n",
            "{\"response\":\"element\",\"msgid\":1,\"user\":{\"id\":2,\"login\":\"bob\"}}\n",
            "{\"response\":\"end\",\"msgid\":1}\n",
            "{\"response\":\"ack\",\"msgid\":2}\n",
        )]);
        match client.user_list() {
            Err(ClientError::Validation(e)) => {
                assert_eq!(e.errors.len(), 1);
                assert_eq!(e.errors[0].field(), "user.id");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(client.ping().unwrap(), Response::Ack { msgid: 2 });
    }

    #[test]
    fn bad_begin_is_reported_after_the_closing_frame() {
        let (mut client, _) = client_with(&[concat!(
            "{\"response\":\"begin\",\"msgid\":\"one\"}\n",
            "{\"response\":\"element\",\"msgid\":1,\"user\":{\"id\":1,\"login\":\"alice\"}}\n",
            "{\"response\":\"ack\",\"msgid\":2}\n",
        )]);
        match client.user_get("alice") {
            Err(ClientError::Validation(e)) => assert_eq!(e.errors[0].field(), "msgid"),
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(client.ping().unwrap(), Response::Ack { msgid: 2 });
    }

    #[test]
    fn reply_after_malformed_frame_in_same_read_is_kept() {
        let (mut client, _) = client_with(&["{\"response\":]\n{\"response\":\"ack\",\"msgid\":1}\n"]);
        assert!(matches!(client.ping(), Err(ClientError::Protocol(_))));
        assert_eq!(client.recv_response::<Body>().unwrap(), Response::Ack { msgid: 1 });
    }

    #[test]
    fn begin_then_end_closes_single_reply() {
        let (mut client, _) = client_with(&[
            "{\"response\":\"begin\",\"msgid\":1}\n{\"response\":\"end\",\"msgid\":1}\n",
            "{\"response\":\"ack\",\"msgid\":2}\n",
        ]);
        assert_eq!(client.user_get("nobody").unwrap(), Response::End { msgid: 1 });
        assert!(client.ping().unwrap().is_ack());
    }

    #[test]
    fn drained_notification_is_logged_as_received() {
        let wire = "{\"tag\":\"0a01\",\"channel\":\"debug\",\"message\":\"hi\",\"extra\":[1,2]}";
        let line = format!("{}\n", wire);
        let (mut client, _) = client_with(&[line.as_str()]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_LOG_FILE);
        let mut log = NotificationLog::open(&path).unwrap();

        let notification = client.drain_notification(&mut log).unwrap();
        assert_eq!(notification.channel(), Channel::Debug);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), format!("{}\n", wire));
    }

    #[test]
    fn single_response_skips_begin_frame() {
        let (mut client, _) = client_with(&[
            "{\"response\":\"begin\",\"msgid\":1}{\"response\":\"element\",\"msgid\":1,\"id\":\"c0de\"}",
        ]);
        let response = client.cell_add(Cell::new("c0de", "10.0.0.2").with_port(5000)).unwrap();
        assert_eq!(response.element().unwrap()["id"], "c0de");
    }

    #[test]
    fn multi_channel_join_reads_until_end() {
        let (mut client, written) = client_with(&[
            "{\"response\":\"begin\",\"msgid\":1}\n",
            "{\"response\":\"element\",\"msgid\":1,\"channel\":\"measurements\"}\n",
            "{\"response\":\"element\",\"msgid\":1,\"channel\":\"solution\"}\n{\"response\":\"end\",\"msgid\":1}\n",
        ]);
        let channels = ChannelSelection::new(vec![Channel::Measurements, Channel::Solution]).unwrap();
        let frames = client.channel_join(&channels).unwrap();
        assert_eq!(frames.len(), 4);
        assert_eq!(elements(&frames).count(), 2);
        assert_eq!(
            sent_requests(&written)[0]["channel"],
            json!(["measurements", "solution"])
        );
    }

    #[test]
    fn single_channel_join_reads_one_frame() {
        let (mut client, _) = client_with(&["{\"response\":\"ack\",\"msgid\":1}"]);
        let channels = ChannelSelection::new(vec![Channel::Solution]).unwrap();
        let frames = client.channel_join(&channels).unwrap();
        assert_eq!(frames, vec![Response::Ack { msgid: 1 }]);
    }

    #[test]
    fn notification_during_request_is_queued() {
        let (mut client, _) = client_with(&[
            "{\"channel\":\"debug\",\"message\":\"hello\"}\n{\"response\":\"ack\",\"msgid\":1}\n",
        ]);
        assert!(client.ping().unwrap().is_ack());
        let notification = client.recv_notification().unwrap();
        assert_eq!(notification.channel(), Channel::Debug);
    }

    #[test]
    fn closed_stream_is_reported() {
        let (mut client, _) = client_with(&[]);
        let err = client.recv_notification().unwrap_err();
        assert!(matches!(err, ClientError::Closed));
        assert!(err.is_fatal());
    }

    #[test]
    fn reconnect_restarts_msgids() {
        let (mut client, _) = client_with(&["{\"response\":\"ack\",\"msgid\":1}"]);
        client.ping().unwrap();
        assert_eq!(client.last_msgid(), 1);

        let transport = ScriptedTransport::new(&["{\"response\":\"ack\",\"msgid\":1}"]);
        let written = Arc::clone(&transport.written);
        client.connect_with(Box::new(transport)).unwrap();
        assert_eq!(client.last_msgid(), 0);
        client.ping().unwrap();
        assert_eq!(sent_requests(&written)[0]["msgid"], 1);
    }
}
