// Session: one open transport plus the receive buffer that frames JSON documents
use crate::error::ClientError;
use exl_transport::Transport;
use serde_json::Value;
use std::collections::VecDeque;
use std::io;

const READ_CHUNK: usize = 4096;

pub(crate) struct Session {
    transport: Box<dyn Transport>,
    buffer: Vec<u8>,
    // Bytes received but not yet returned as a frame
    pending: Vec<u8>,
    // Notifications that arrived while a response was awaited
    queued: VecDeque<Value>,
    // Set after a bad document; bytes up to the next newline belong to it
    resync: bool,
    max_message_len: usize,
}

impl Session {
    pub fn new(transport: Box<dyn Transport>, max_message_len: usize) -> Self {
        Session {
            transport,
            buffer: vec![0u8; READ_CHUNK],
            pending: Vec::new(),
            queued: VecDeque::new(),
            resync: false,
            max_message_len,
        }
    }

    pub fn send(&mut self, payload: &[u8]) -> Result<(), ClientError> {
        self.transport.send(payload)?;
        Ok(())
    }

    /// Block until one complete JSON document is available and return it.
    pub fn next_frame(&mut self) -> Result<Value, ClientError> {
        loop {
            if let Some(frame) = self.take_frame()? {
                return Ok(frame);
            }
            if self.pending.len() > self.max_message_len {
                self.pending.clear();
                self.resync = true;
                return Err(ClientError::MessageTooLarge {
                    limit: self.max_message_len,
                });
            }

            let n = self.transport.receive(&mut self.buffer)?;
            if n == 0 {
                return Err(ClientError::Closed);
            }
            self.pending.extend_from_slice(&self.buffer[..n]);
        }
    }

    // Drop the rest of a rejected document. Frames are newline-delimited, so
    // the next frame starts after the next newline.
    fn skip_rejected(&mut self) -> bool {
        match self.pending.iter().position(|&b| b == b'\n') {
            Some(end) => {
                self.pending.drain(..=end);
                self.resync = false;
                true
            }
            None => {
                self.pending.clear();
                false
            }
        }
    }

    // Split the first complete document off the front of the pending bytes
    fn take_frame(&mut self) -> Result<Option<Value>, ClientError> {
        if self.resync && !self.skip_rejected() {
            return Ok(None);
        }
        let Some(start) = self.pending.iter().position(|b| !b.is_ascii_whitespace()) else {
            self.pending.clear();
            return Ok(None);
        };

        let (result, consumed) = {
            let mut stream =
                serde_json::Deserializer::from_slice(&self.pending[start..]).into_iter::<Value>();
            let result = stream.next();
            (result, stream.byte_offset())
        };

        match result {
            Some(Ok(frame)) => {
                self.pending.drain(..start + consumed);
                Ok(Some(frame))
            }
            Some(Err(e)) if e.is_eof() => Ok(None),
            Some(Err(e)) => {
                self.pending.drain(..start);
                self.resync = true;
                Err(ClientError::Protocol(e))
            }
            None => Ok(None),
        }
    }

    pub fn queue_notification(&mut self, frame: Value) {
        self.queued.push_back(frame);
    }

    pub fn pop_notification(&mut self) -> Option<Value> {
        self.queued.pop_front()
    }

    pub fn close(mut self) -> io::Result<()> {
        self.transport.disconnect()
    }
}
