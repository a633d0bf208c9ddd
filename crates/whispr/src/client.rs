//! Client side of the protocol.
//!
//! [`ChatClient`] drives one connection through the greeting, the
//! handshake, and authentication, then sends and receives chat
//! messages. Once logged in it can be split into a [`ChatReader`] and a
//! [`ChatWriter`] so that reading and sending run independently.
//!
//! [`ClientCommand`] and [`Incoming`] implement the text conventions a
//! line-oriented front end needs: what the user typed, and what the
//! server's delivered text means.

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use whispr_crypto::{ClientKeyPair, SessionKey};
use whispr_protocol::{ClientMessage, MessageType, Request, Response, ResponseCode, encode, read_response};
use whispr_transport::TransportError;

use crate::WhisprError;

fn expect_code(response: &Response, expected: ResponseCode) -> Result<(), WhisprError> {
    if response.code == expected {
        Ok(())
    } else {
        Err(WhisprError::UnexpectedResponse {
            expected,
            got: response.code,
            text: response.text.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// ChatReader / ChatWriter
// ---------------------------------------------------------------------------

/// The receiving half of a client connection.
pub struct ChatReader {
    reader: BufReader<OwnedReadHalf>,
    session_key: Option<SessionKey>,
}

impl ChatReader {
    /// Reads the next server response, opening the envelope once the
    /// handshake is done.
    ///
    /// Not cancel-safe: dropping the future mid-frame loses the frame.
    pub async fn recv(&mut self) -> Result<Response, WhisprError> {
        Ok(read_response(&mut self.reader, self.session_key.as_ref()).await?)
    }
}

/// The sending half of a client connection.
pub struct ChatWriter {
    writer: OwnedWriteHalf,
    session_key: Option<SessionKey>,
    username: String,
}

impl ChatWriter {
    /// Encodes and writes one request.
    pub async fn send(&mut self, request: &Request) -> Result<(), WhisprError> {
        let frame = encode(request, self.session_key.as_ref())?;
        self.writer
            .write_all(&frame)
            .await
            .map_err(TransportError::SendFailed)?;
        Ok(())
    }

    /// The name this client identified as (empty before `set_username`).
    pub fn username(&self) -> &str {
        &self.username
    }

    pub async fn set_username(&mut self, username: &str) -> Result<(), WhisprError> {
        self.username = username.to_owned();
        self.send(&Request::text(ClientMessage::SetUsername {
            username: username.to_owned(),
        }))
        .await
    }

    pub async fn set_password(&mut self, password: &str) -> Result<(), WhisprError> {
        self.send(&Request::text(ClientMessage::SetPassword {
            username: self.username.clone(),
            password: password.to_owned(),
        }))
        .await
    }

    pub async fn broadcast(&mut self, text: &str) -> Result<(), WhisprError> {
        self.broadcast_as(MessageType::Text, text).await
    }

    /// Broadcasts with an explicit message type (voice clips travel as
    /// hex text).
    pub async fn broadcast_as(&mut self, message_type: MessageType, text: &str) -> Result<(), WhisprError> {
        self.send(&Request {
            message_type,
            message: ClientMessage::Broadcast {
                username: self.username.clone(),
                text: text.to_owned(),
            },
        })
        .await
    }

    pub async fn private(&mut self, recipient: &str, text: &str) -> Result<(), WhisprError> {
        self.private_as(MessageType::Text, recipient, text).await
    }

    /// Sends a private message with an explicit message type.
    pub async fn private_as(
        &mut self,
        message_type: MessageType,
        recipient: &str,
        text: &str,
    ) -> Result<(), WhisprError> {
        self.send(&Request {
            message_type,
            message: ClientMessage::Private {
                username: self.username.clone(),
                recipient: recipient.to_owned(),
                text: text.to_owned(),
            },
        })
        .await
    }

    /// Sends whatever a typed line asked for.
    pub async fn send_command(&mut self, command: &ClientCommand) -> Result<(), WhisprError> {
        match command {
            ClientCommand::SetPassword(password) => self.set_password(password).await,
            ClientCommand::Private { recipient, text } => self.private(recipient, text).await,
            ClientCommand::Broadcast(text) => self.broadcast(text).await,
        }
    }
}

// ---------------------------------------------------------------------------
// ChatClient
// ---------------------------------------------------------------------------

/// A connection to a Whispr server.
///
/// ```rust,no_run
/// use whispr::ChatClient;
///
/// # async fn demo() -> Result<(), whispr::WhisprError> {
/// let mut client = ChatClient::connect("127.0.0.1:5555").await?;
/// client.handshake().await?;
/// client.set_username("alice").await?;
/// client.set_password("hunter2").await?;
/// client.broadcast("hello everyone").await?;
/// # Ok(())
/// # }
/// ```
pub struct ChatClient {
    reader: ChatReader,
    writer: ChatWriter,
    greeting: Response,
}

impl ChatClient {
    /// Connects and reads the server's plaintext greeting.
    pub async fn connect(addr: &str) -> Result<Self, WhisprError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(TransportError::ConnectFailed)?;
        let (read_half, write_half) = stream.into_split();
        let mut reader = ChatReader {
            reader: BufReader::new(read_half),
            session_key: None,
        };
        let greeting = reader.recv().await?;
        expect_code(&greeting, ResponseCode::Hello)?;

        Ok(Self {
            reader,
            writer: ChatWriter {
                writer: write_half,
                session_key: None,
                username: String::new(),
            },
            greeting,
        })
    }

    /// The HELLO response received on connect.
    pub fn greeting(&self) -> &Response {
        &self.greeting
    }

    pub fn session_key(&self) -> Option<&SessionKey> {
        self.reader.session_key.as_ref()
    }

    /// Generates a fresh RSA keypair on a blocking thread and runs the
    /// handshake with it.
    pub async fn handshake(&mut self) -> Result<(), WhisprError> {
        let keypair = tokio::task::spawn_blocking(ClientKeyPair::generate)
            .await
            .map_err(std::io::Error::other)??;
        self.handshake_with(&keypair).await
    }

    /// Runs the handshake with an existing keypair.
    pub async fn handshake_with(&mut self, keypair: &ClientKeyPair) -> Result<(), WhisprError> {
        let public_key_pem = keypair.public_key_pem()?;
        self.writer
            .send(&Request::text(ClientMessage::Handshake { public_key_pem }))
            .await?;

        let reply = self.reader.recv().await?;
        expect_code(&reply, ResponseCode::Handshake)?;
        let key = keypair.accept_session_key(&reply.text)?;
        self.reader.session_key = Some(key.clone());
        self.writer.session_key = Some(key);
        Ok(())
    }

    /// Sends SET_USERNAME and returns the server's answer
    /// (`USER_EXISTS` or `USER_DOES_NOT_EXIST`).
    pub async fn set_username(&mut self, username: &str) -> Result<Response, WhisprError> {
        self.writer.set_username(username).await?;
        self.reader.recv().await
    }

    /// Sends SET_PASSWORD and returns the server's first answer
    /// (`CREATED_USER`, `CORRECT_PASSWORD` or `INCORRECT_PASSWORD`). On
    /// success the roster follows and can be read with [`recv`](Self::recv).
    pub async fn set_password(&mut self, password: &str) -> Result<Response, WhisprError> {
        self.writer.set_password(password).await?;
        self.reader.recv().await
    }

    pub async fn broadcast(&mut self, text: &str) -> Result<(), WhisprError> {
        self.writer.broadcast(text).await
    }

    pub async fn private(&mut self, recipient: &str, text: &str) -> Result<(), WhisprError> {
        self.writer.private(recipient, text).await
    }

    pub async fn private_as(
        &mut self,
        message_type: MessageType,
        recipient: &str,
        text: &str,
    ) -> Result<(), WhisprError> {
        self.writer.private_as(message_type, recipient, text).await
    }

    pub async fn broadcast_as(&mut self, message_type: MessageType, text: &str) -> Result<(), WhisprError> {
        self.writer.broadcast_as(message_type, text).await
    }

    pub async fn recv(&mut self) -> Result<Response, WhisprError> {
        self.reader.recv().await
    }

    /// Splits into independently usable halves.
    pub fn into_split(self) -> (ChatReader, ChatWriter) {
        (self.reader, self.writer)
    }
}

// ---------------------------------------------------------------------------
// ClientCommand
// ---------------------------------------------------------------------------

/// A line typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// `/set_password <password>`
    SetPassword(String),
    /// `/msg <recipient> <text...>`
    Private { recipient: String, text: String },
    /// Anything else.
    Broadcast(String),
}

/// A slash command with the wrong shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
    #[error("usage: /set_password <password>")]
    SetPassword,
    #[error("usage: /msg <recipient> <message>")]
    Private,
}

impl ClientCommand {
    /// Parses a typed line. Command names are case-insensitive; arguments
    /// are separated by single spaces.
    pub fn parse(line: &str) -> Result<Self, UsageError> {
        let line = line.trim_start();
        let lowered = line.to_lowercase();

        if lowered.starts_with("/set_password") {
            let parts: Vec<&str> = line.trim_end().split(' ').collect();
            return match parts.as_slice() {
                [_, password] => Ok(Self::SetPassword((*password).to_owned())),
                _ => Err(UsageError::SetPassword),
            };
        }
        if lowered.starts_with("/msg") {
            let mut parts = line.split(' ');
            parts.next();
            let recipient = parts.next().ok_or(UsageError::Private)?;
            let text = parts.collect::<Vec<_>>().join(" ");
            return Ok(Self::Private {
                recipient: recipient.to_owned(),
                text,
            });
        }
        Ok(Self::Broadcast(line.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Incoming
// ---------------------------------------------------------------------------

const PRIVATE_PREFIX: &str = "[Private Message from ";

/// What a delivered text means to the reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// `[Private Message from <sender>]: <text>`
    Private { sender: String, text: String },
    /// `SERVER: <text>`, a direct reply from the server. Also used for
    /// private-looking texts that do not parse.
    Server { text: String },
    /// `<sender>: <text>`, including `Server: ...` notices.
    Broadcast { sender: String, text: String },
    /// No `:` anywhere.
    Malformed(String),
}

impl Incoming {
    pub fn classify(raw: &str) -> Self {
        if raw.starts_with(PRIVATE_PREFIX) {
            return match raw.split_once("]:") {
                Some((prefix, text)) => Self::Private {
                    sender: prefix.replacen(PRIVATE_PREFIX, "", 1).trim().to_owned(),
                    text: text.trim().to_owned(),
                },
                None => Self::Server {
                    text: raw.to_owned(),
                },
            };
        }
        if let Some(rest) = raw.strip_prefix("SERVER:") {
            let text = raw.split_once(": ").map_or(rest, |(_, text)| text);
            return Self::Server {
                text: text.to_owned(),
            };
        }
        match raw.split_once(':') {
            Some((sender, text)) => Self::Broadcast {
                sender: sender.trim().to_owned(),
                text: text.trim().to_owned(),
            },
            None => Self::Malformed(raw.to_owned()),
        }
    }
}
