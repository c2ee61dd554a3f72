//! JSON-over-TCP compile service.
//!
//! One request per connection: the client sends a JSON object and closes
//! its write side; the server replies with a single JSON object and closes.
//! `{"command":"compile","code":"..."}` answers `{"program":"<base64 ELF>"}`
//! on success or `{"error":"..."}` on failure; `{"command":"ping"}` answers
//! `{}`. Each connection is handled on its own thread; all compiler state
//! is per-invocation, so connections share nothing.

use crate::LinkOptions;
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct Request {
    command: String,
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Default, Serialize)]
struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    program: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Response {
    fn error(message: impl Into<String>) -> Self {
        Response {
            program: None,
            error: Some(message.into()),
        }
    }
}

/// Bind `host:port` and serve forever.
pub fn run_server(host: &str, port: u16) -> io::Result<()> {
    let listener = TcpListener::bind((host, port))?;
    info!(address = %listener.local_addr()?, "compile server listening");
    serve(listener)
}

/// Serve connections from an already-bound listener.
pub fn serve(listener: TcpListener) -> io::Result<()> {
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                thread::spawn(move || {
                    if let Err(e) = handle_connection(stream) {
                        warn!(error = %e, "connection failed");
                    }
                });
            }
            Err(e) => warn!(error = %e, "failed to accept connection"),
        }
    }
    Ok(())
}

fn handle_connection(mut stream: TcpStream) -> io::Result<()> {
    let mut request_text = String::new();
    stream.read_to_string(&mut request_text)?;
    let response = respond(&request_text);
    let response_text = serde_json::to_string(&response).map_err(io::Error::other)?;
    stream.write_all(response_text.as_bytes())?;
    Ok(())
}

fn respond(request_text: &str) -> Response {
    let request: Request = match serde_json::from_str(request_text) {
        Ok(request) => request,
        Err(e) => return Response::error(format!("invalid request: {}", e)),
    };

    match request.command.as_str() {
        "ping" => Response::default(),
        "compile" => {
            let Some(code) = request.code else {
                return Response::error("compile request is missing \"code\"");
            };
            info!(bytes = code.len(), "compile request");
            match crate::compile_to_executable(&code, "(source code)", &LinkOptions::default()) {
                Ok(executable) => Response {
                    program: Some(STANDARD.encode(&executable)),
                    error: None,
                },
                Err(e) => Response::error(e.to_string()),
            }
        }
        other => Response::error(format!("Unknown command: {}", other)),
    }
}
