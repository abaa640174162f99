//! Scripted serial port implementing the embedded-io traits.

use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::convert::Infallible;

use embedded_io::{ErrorType, Read, ReadReady, Write};

/// Serial channel fed from a byte script.
///
/// Received bytes are queued with [`push_rx`](Self::push_rx) /
/// [`push_line`](Self::push_line); everything the driver writes is recorded.
/// An optional auto-reply is queued after every write, which stands in for a
/// module acknowledging commands. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSerial {
    inner: Rc<RefCell<SerialState>>,
}

#[derive(Debug, Default)]
struct SerialState {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    auto_reply: Option<Vec<u8>>,
}

impl ScriptedSerial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_rx(&self, bytes: &[u8]) {
        self.inner.borrow_mut().rx.extend(bytes.iter().copied());
    }

    /// Queue `line` followed by CR LF
    pub fn push_line(&self, line: &str) {
        self.push_rx(line.as_bytes());
        self.push_rx(b"\r\n");
    }

    /// Bytes queued but not yet read by the driver
    pub fn pending_rx(&self) -> usize {
        self.inner.borrow().rx.len()
    }

    pub fn set_auto_reply(&self, reply: Option<&[u8]>) {
        self.inner.borrow_mut().auto_reply = reply.map(|r| r.to_vec());
    }

    /// Everything written so far, lossily decoded
    pub fn written(&self) -> String {
        String::from_utf8_lossy(&self.inner.borrow().tx).into_owned()
    }
}

impl ErrorType for ScriptedSerial {
    type Error = Infallible;
}

impl Read for ScriptedSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut state = self.inner.borrow_mut();
        let mut count = 0;
        while count < buf.len() {
            match state.rx.pop_front() {
                Some(byte) => {
                    buf[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }
        Ok(count)
    }
}

impl ReadReady for ScriptedSerial {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.inner.borrow().rx.is_empty())
    }
}

impl Write for ScriptedSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let mut state = self.inner.borrow_mut();
        state.tx.extend_from_slice(buf);
        if let Some(reply) = state.auto_reply.clone() {
            state.rx.extend(reply);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
