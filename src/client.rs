//! Client library for connecting to a redlite server
//!
//! Speaks RESP: every request is sent as an array of bulk strings and every
//! reply is decoded with the same frame parser the server uses.

use crate::error::{RedliteError, Result};
use crate::protocol::{parse_frame, Frame};
use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// Client for connecting to a redlite server
pub struct Client {
    reader: OwnedReadHalf,
    writer: BufWriter<OwnedWriteHalf>,
    buffer: BytesMut,
}

impl Client {
    /// Connect to a redlite server
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = stream.into_split();

        Ok(Self {
            reader,
            writer: BufWriter::new(writer),
            buffer: BytesMut::with_capacity(4096),
        })
    }

    /// Send a raw command and return the reply frame as-is
    pub async fn send<I, T>(&mut self, parts: I) -> Result<Frame>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let request = Frame::command(parts);
        self.writer.write_all(&request.to_bytes()).await?;
        self.writer.flush().await?;
        self.read_reply().await
    }

    async fn read_reply(&mut self) -> Result<Frame> {
        loop {
            if let Some((frame, consumed)) = parse_frame(&self.buffer[..])? {
                self.buffer.advance(consumed);
                return Ok(frame);
            }
            if self.reader.read_buf(&mut self.buffer).await? == 0 {
                return Err(RedliteError::Client(
                    "connection closed by server".to_string(),
                ));
            }
        }
    }

    /// Send a command, turning `-ERR` replies into errors
    async fn call<I, T>(&mut self, parts: I) -> Result<Frame>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        match self.send(parts).await? {
            Frame::Error(message) => Err(RedliteError::Server(message)),
            frame => Ok(frame),
        }
    }

    pub async fn ping(&mut self) -> Result<String> {
        match self.call(["PING"]).await? {
            Frame::Simple(s) => Ok(s),
            other => Err(unexpected("PING", &other)),
        }
    }

    pub async fn echo(&mut self, message: &str) -> Result<String> {
        match self.call(["ECHO", message]).await? {
            Frame::Bulk(data) => Ok(String::from_utf8_lossy(&data).into_owned()),
            other => Err(unexpected("ECHO", &other)),
        }
    }

    /// Set a key-value pair with no expiry
    pub async fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let reply = self.call(["SET", key, value]).await?;
        expect_ok("SET", reply)
    }

    /// Set a key-value pair that expires after `millis` milliseconds
    pub async fn set_px(&mut self, key: &str, value: &str, millis: i64) -> Result<()> {
        let millis = millis.to_string();
        let reply = self.call(["SET", key, value, "PX", millis.as_str()]).await?;
        expect_ok("SET", reply)
    }

    /// Get a value by key
    pub async fn get(&mut self, key: &str) -> Result<Option<String>> {
        match self.call(["GET", key]).await? {
            Frame::Bulk(data) => Ok(Some(String::from_utf8_lossy(&data).into_owned())),
            Frame::Null => Ok(None),
            other => Err(unexpected("GET", &other)),
        }
    }

    /// `CONFIG GET <param>`, returning the parameter's value
    pub async fn config_get(&mut self, param: &str) -> Result<String> {
        match self.call(["CONFIG", "GET", param]).await? {
            Frame::Array(items) => match items.as_slice() {
                [_, Frame::Bulk(value)] => Ok(String::from_utf8_lossy(value).into_owned()),
                _ => Err(RedliteError::Protocol(
                    "Unexpected response for CONFIG GET".to_string(),
                )),
            },
            other => Err(unexpected("CONFIG GET", &other)),
        }
    }

    /// Snapshot keys matching a glob pattern
    pub async fn keys(&mut self, pattern: &str) -> Result<Vec<String>> {
        match self.call(["KEYS", pattern]).await? {
            Frame::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Frame::Bulk(data) => Ok(String::from_utf8_lossy(&data).into_owned()),
                    other => Err(unexpected("KEYS", &other)),
                })
                .collect(),
            other => Err(unexpected("KEYS", &other)),
        }
    }

    /// Close the connection
    pub async fn close(mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

fn expect_ok(command: &str, reply: Frame) -> Result<()> {
    match reply {
        Frame::Simple(s) if s == "OK" => Ok(()),
        other => Err(unexpected(command, &other)),
    }
}

fn unexpected(command: &str, frame: &Frame) -> RedliteError {
    RedliteError::Protocol(format!("Unexpected response for {}: {:?}", command, frame))
}
