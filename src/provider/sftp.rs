//! SFTP-style provider: shells out to a `serve` subprocess over stdio
//!
//! Grounded on the teacher's `src/connection.rs` (`ConnectionType::detect`,
//! piped stdin/stdout over `tokio::process::Command`) and `src/serve.rs`,
//! generalized from the teacher's n-way text wire protocol to this spec's
//! line-oriented JSON request/response protocol over the `Provider`
//! operation set. The subprocess is this same binary invoked in `serve`
//! mode (see `src/main.rs`); for a remote host it is launched via
//! `ssh host <bin> serve --root <path>`.

use crate::error::ProviderError;
use crate::provider::{Provider, ReadStream};
use crate::state::{FileState, StorageState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::Mutex;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
	Enumerate { depth: Option<usize> },
	Stat { path: String },
	Read { path: String },
	Write { path: String, content_b64: String },
	Update { path: String, content_b64: String, expected_revision: String },
	Remove { path: String },
	Move { src: String, dst: String },
	ComputeHash { path: String, hash_type: String },
	Capabilities,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
	Ok { value: serde_json::Value },
	Err {
		kind: String,
		message: String,
		#[serde(default)]
		path: Option<String>,
		#[serde(default)]
		hash_type: Option<String>,
	},
}

/// Map a `ProviderError` to its wire `Response`, preserving the variant
/// (and its path/hash_type payload) instead of collapsing it to a generic
/// kind, so the client side of `send` can reconstruct the original error.
fn error_to_response(e: &ProviderError) -> Response {
	let message = e.to_string();
	match e {
		ProviderError::NotFound { path } => {
			Response::Err { kind: "not_found".to_string(), message, path: Some(path.clone()), hash_type: None }
		}
		ProviderError::AlreadyExists { path } => {
			Response::Err { kind: "already_exists".to_string(), message, path: Some(path.clone()), hash_type: None }
		}
		ProviderError::Conflict { path } => {
			Response::Err { kind: "conflict".to_string(), message, path: Some(path.clone()), hash_type: None }
		}
		ProviderError::UnsupportedHash { hash_type } => Response::Err {
			kind: "unsupported_hash".to_string(),
			message,
			path: None,
			hash_type: Some(hash_type.clone()),
		},
		ProviderError::ConnectionFailed { .. } => {
			Response::Err { kind: "connection_failed".to_string(), message, path: None, hash_type: None }
		}
		ProviderError::SpawnFailed { .. } => {
			Response::Err { kind: "spawn_failed".to_string(), message, path: None, hash_type: None }
		}
		ProviderError::ProtocolError { .. } => {
			Response::Err { kind: "protocol".to_string(), message, path: None, hash_type: None }
		}
		ProviderError::Io(_) => Response::Err { kind: "io".to_string(), message, path: None, hash_type: None },
	}
}

/// Entry point used by the `serve` subcommand: reads one `Request` per line
/// from `stdin`, dispatches it against `provider`, writes one `Response`
/// per line to `stdout`.
pub async fn serve_loop(provider: &dyn Provider) -> std::io::Result<()> {
	let stdin = tokio::io::stdin();
	let mut stdout = tokio::io::stdout();
	let mut lines = BufReader::new(stdin).lines();

	while let Some(line) = lines.next_line().await? {
		if line.trim().is_empty() {
			continue;
		}
		let response = match serde_json::from_str::<Request>(&line) {
			Ok(request) => handle(provider, request).await,
			Err(e) => {
				Response::Err { kind: "protocol".to_string(), message: e.to_string(), path: None, hash_type: None }
			}
		};
		let encoded = serde_json::to_string(&response).unwrap_or_else(|_| {
			r#"{"status":"err","kind":"protocol","message":"failed to encode response"}"#.to_string()
		});
		stdout.write_all(encoded.as_bytes()).await?;
		stdout.write_all(b"\n").await?;
		stdout.flush().await?;
	}
	Ok(())
}

async fn handle(provider: &dyn Provider, request: Request) -> Response {
	use base64::Engine;
	let b64 = base64::engine::general_purpose::STANDARD;

	let result: Result<serde_json::Value, ProviderError> = async {
		match request {
			Request::Enumerate { depth } => {
				let state = provider.enumerate(depth).await?;
				Ok(serde_json::to_value(state).unwrap())
			}
			Request::Stat { path } => {
				let state = provider.stat(&path).await?;
				Ok(serde_json::to_value(state).unwrap())
			}
			Request::Read { path } => {
				use tokio::io::AsyncReadExt;
				let mut stream = provider.open_read(&path).await?;
				let mut buf = Vec::new();
				stream.read_to_end(&mut buf).await?;
				Ok(serde_json::json!({ "content_b64": b64.encode(buf) }))
			}
			Request::Write { path, content_b64 } => {
				let bytes = b64
					.decode(content_b64)
					.map_err(|e| ProviderError::ProtocolError { message: e.to_string() })?;
				provider.write(&path, Box::pin(std::io::Cursor::new(bytes))).await?;
				Ok(serde_json::Value::Null)
			}
			Request::Update { path, content_b64, expected_revision } => {
				let bytes = b64
					.decode(content_b64)
					.map_err(|e| ProviderError::ProtocolError { message: e.to_string() })?;
				provider.update(&path, Box::pin(std::io::Cursor::new(bytes)), &expected_revision).await?;
				Ok(serde_json::Value::Null)
			}
			Request::Remove { path } => {
				provider.remove_file(&path).await?;
				Ok(serde_json::Value::Null)
			}
			Request::Move { src, dst } => {
				provider.move_file(&src, &dst).await?;
				Ok(serde_json::Value::Null)
			}
			Request::ComputeHash { path, hash_type } => {
				let digest = provider.compute_hash(&path, &hash_type).await?;
				Ok(serde_json::json!({ "digest": digest }))
			}
			Request::Capabilities => Ok(serde_json::json!({
				"case_sensitive": provider.is_case_sensitive(),
				"supported_hashes": provider.supported_hashes(),
			})),
		}
	}
	.await;

	match result {
		Ok(value) => Response::Ok { value },
		Err(e) => error_to_response(&e),
	}
}

struct Session {
	stdin: ChildStdin,
	stdout: BufReader<ChildStdout>,
	_child: Child,
}

/// A `Provider` that talks to a spawned subprocess over stdio.
pub struct SftpProvider {
	handle: String,
	session: Arc<Mutex<Session>>,
	case_sensitive: bool,
	supported_hashes: Vec<String>,
	spawn: SpawnSpec,
}

#[derive(Clone)]
enum SpawnSpec {
	Local { root: String },
	Remote { host: String, user: String, root: String, port: u16 },
}

impl SftpProvider {
	async fn spawn(spec: &SpawnSpec) -> Result<Session, ProviderError> {
		let mut cmd = match spec {
			SpawnSpec::Local { root } => {
				let exe = std::env::current_exe()
					.map_err(|e| ProviderError::SpawnFailed { cmd: "self".to_string(), source: e })?;
				let mut c = tokio::process::Command::new(exe);
				c.args(["serve", "--root", root]);
				c
			}
			SpawnSpec::Remote { host, user, root, port } => {
				let mut c = tokio::process::Command::new("ssh");
				c.args([
					"-p",
					&port.to_string(),
					&format!("{}@{}", user, host),
					"bisync",
					"serve",
					"--root",
					root,
				]);
				c
			}
		};

		let mut child = cmd
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.spawn()
			.map_err(|e| ProviderError::SpawnFailed { cmd: "bisync serve".to_string(), source: e })?;

		let stdin = child
			.stdin
			.take()
			.ok_or_else(|| ProviderError::ProtocolError { message: "stdin unavailable".to_string() })?;
		let stdout = child
			.stdout
			.take()
			.ok_or_else(|| ProviderError::ProtocolError { message: "stdout unavailable".to_string() })?;

		Ok(Session { stdin, stdout: BufReader::new(stdout), _child: child })
	}

	/// Connect to a local `serve` subprocess rooted at `root`.
	pub async fn connect_local(root: impl Into<String>) -> Result<Self, ProviderError> {
		let spec = SpawnSpec::Local { root: root.into() };
		let session = Self::spawn(&spec).await?;
		Self::finish_connect(spec, session).await
	}

	/// Connect over SSH to a remote `bisync serve` subprocess.
	pub async fn connect_remote(
		host: impl Into<String>,
		user: impl Into<String>,
		root: impl Into<String>,
		port: u16,
	) -> Result<Self, ProviderError> {
		let spec = SpawnSpec::Remote { host: host.into(), user: user.into(), root: root.into(), port };
		let session = Self::spawn(&spec).await?;
		Self::finish_connect(spec, session).await
	}

	async fn finish_connect(spec: SpawnSpec, mut session: Session) -> Result<Self, ProviderError> {
		let caps: serde_json::Value = send(&mut session, Request::Capabilities).await?;
		let case_sensitive = caps["case_sensitive"].as_bool().unwrap_or(true);
		let supported_hashes = caps["supported_hashes"]
			.as_array()
			.map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
			.unwrap_or_default();

		let handle = match &spec {
			SpawnSpec::Local { root } => format!("SFTP:local:{}", root),
			SpawnSpec::Remote { host, root, .. } => format!("SFTP:{}:{}", host, root),
		};

		Ok(SftpProvider {
			handle,
			session: Arc::new(Mutex::new(session)),
			case_sensitive,
			supported_hashes,
			spawn: spec,
		})
	}
}

async fn send(session: &mut Session, request: Request) -> Result<serde_json::Value, ProviderError> {
	let line = serde_json::to_string(&request)
		.map_err(|e| ProviderError::ProtocolError { message: e.to_string() })?;
	session.stdin.write_all(line.as_bytes()).await?;
	session.stdin.write_all(b"\n").await?;
	session.stdin.flush().await?;

	let mut response_line = String::new();
	session.stdout.read_line(&mut response_line).await?;
	if response_line.is_empty() {
		return Err(ProviderError::ProtocolError { message: "subprocess closed stdout".to_string() });
	}

	let response: Response = serde_json::from_str(response_line.trim())
		.map_err(|e| ProviderError::ProtocolError { message: e.to_string() })?;
	match response {
		Response::Ok { value } => Ok(value),
		Response::Err { kind, message, path, hash_type } => Err(error_from_response(&kind, message, path, hash_type)),
	}
}

/// Inverse of `error_to_response`: reconstruct the `ProviderError` variant a
/// remote `kind` stands for instead of flattening everything to
/// `ProtocolError`. Unknown kinds (e.g. from a newer peer) still fall back
/// to `ProtocolError` rather than failing the whole response.
fn error_from_response(kind: &str, message: String, path: Option<String>, hash_type: Option<String>) -> ProviderError {
	match kind {
		"not_found" => ProviderError::NotFound { path: path.unwrap_or(message) },
		"already_exists" => ProviderError::AlreadyExists { path: path.unwrap_or(message) },
		"conflict" => ProviderError::Conflict { path: path.unwrap_or(message) },
		"unsupported_hash" => ProviderError::UnsupportedHash { hash_type: hash_type.unwrap_or(message) },
		"io" => ProviderError::Io(io::Error::new(io::ErrorKind::Other, message)),
		_ => ProviderError::ProtocolError { message },
	}
}

#[async_trait]
impl Provider for SftpProvider {
	fn handle(&self) -> String {
		self.handle.clone()
	}

	fn is_case_sensitive(&self) -> bool {
		self.case_sensitive
	}

	fn supported_hashes(&self) -> Vec<String> {
		self.supported_hashes.clone()
	}

	async fn enumerate(&self, depth: Option<usize>) -> Result<StorageState, ProviderError> {
		let mut session = self.session.lock().await;
		let value = send(&mut session, Request::Enumerate { depth }).await?;
		serde_json::from_value(value)
			.map_err(|e| ProviderError::ProtocolError { message: e.to_string() })
	}

	async fn stat(&self, path: &str) -> Result<FileState, ProviderError> {
		let mut session = self.session.lock().await;
		let value = send(&mut session, Request::Stat { path: path.to_string() }).await?;
		serde_json::from_value(value)
			.map_err(|e| ProviderError::ProtocolError { message: e.to_string() })
	}

	async fn open_read(&self, path: &str) -> Result<ReadStream, ProviderError> {
		use base64::Engine;
		let mut session = self.session.lock().await;
		let value = send(&mut session, Request::Read { path: path.to_string() }).await?;
		let content_b64 = value["content_b64"].as_str().unwrap_or_default();
		let bytes = base64::engine::general_purpose::STANDARD
			.decode(content_b64)
			.map_err(|e| ProviderError::ProtocolError { message: e.to_string() })?;
		Ok(Box::pin(std::io::Cursor::new(bytes)))
	}

	async fn write(&self, path: &str, mut stream: ReadStream) -> Result<(), ProviderError> {
		use base64::Engine;
		use tokio::io::AsyncReadExt;
		let mut buf = Vec::new();
		stream.read_to_end(&mut buf).await?;
		let mut session = self.session.lock().await;
		send(
			&mut session,
			Request::Write {
				path: path.to_string(),
				content_b64: base64::engine::general_purpose::STANDARD.encode(buf),
			},
		)
		.await?;
		Ok(())
	}

	async fn update(
		&self,
		path: &str,
		mut stream: ReadStream,
		expected_revision: &str,
	) -> Result<(), ProviderError> {
		use base64::Engine;
		use tokio::io::AsyncReadExt;
		let mut buf = Vec::new();
		stream.read_to_end(&mut buf).await?;
		let mut session = self.session.lock().await;
		send(
			&mut session,
			Request::Update {
				path: path.to_string(),
				content_b64: base64::engine::general_purpose::STANDARD.encode(buf),
				expected_revision: expected_revision.to_string(),
			},
		)
		.await?;
		Ok(())
	}

	async fn remove_file(&self, path: &str) -> Result<(), ProviderError> {
		let mut session = self.session.lock().await;
		send(&mut session, Request::Remove { path: path.to_string() }).await?;
		Ok(())
	}

	async fn move_file(&self, src: &str, dst: &str) -> Result<(), ProviderError> {
		let mut session = self.session.lock().await;
		send(&mut session, Request::Move { src: src.to_string(), dst: dst.to_string() }).await?;
		Ok(())
	}

	async fn compute_hash(&self, path: &str, hash_type: &str) -> Result<String, ProviderError> {
		let mut session = self.session.lock().await;
		let value =
			send(&mut session, Request::ComputeHash { path: path.to_string(), hash_type: hash_type.to_string() })
				.await?;
		Ok(value["digest"].as_str().unwrap_or_default().to_string())
	}

	/// Spawns a fresh subprocess sharing this provider's connection spec, so
	/// each executor worker gets its own session instead of contending on
	/// one child's stdio.
	async fn clone_provider(&self) -> Result<Box<dyn Provider>, ProviderError> {
		let session = Self::spawn(&self.spawn).await?;
		let clone = Self::finish_connect(self.spawn.clone(), session).await?;
		Ok(Box::new(clone))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn round_trip(e: ProviderError) -> ProviderError {
		match error_to_response(&e) {
			Response::Err { kind, message, path, hash_type } => error_from_response(&kind, message, path, hash_type),
			Response::Ok { .. } => unreachable!("error_to_response never returns Ok"),
		}
	}

	#[test]
	fn not_found_survives_the_wire() {
		let result = round_trip(ProviderError::NotFound { path: "a/b.txt".to_string() });
		assert!(matches!(result, ProviderError::NotFound { path } if path == "a/b.txt"));
	}

	#[test]
	fn conflict_survives_the_wire() {
		let result = round_trip(ProviderError::Conflict { path: "a.txt".to_string() });
		assert!(matches!(result, ProviderError::Conflict { path } if path == "a.txt"));
	}

	#[test]
	fn already_exists_survives_the_wire() {
		let result = round_trip(ProviderError::AlreadyExists { path: "dst.txt".to_string() });
		assert!(matches!(result, ProviderError::AlreadyExists { path } if path == "dst.txt"));
	}

	#[test]
	fn unsupported_hash_survives_the_wire() {
		let result = round_trip(ProviderError::UnsupportedHash { hash_type: "sha256-blocked".to_string() });
		assert!(matches!(result, ProviderError::UnsupportedHash { hash_type } if hash_type == "sha256-blocked"));
	}

	#[test]
	fn unknown_kind_falls_back_to_protocol_error() {
		let result = error_from_response("some_future_kind", "oops".to_string(), None, None);
		assert!(matches!(result, ProviderError::ProtocolError { message } if message == "oops"));
	}
}

// vim: ts=4
