// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `mail:sendmail` — a reference mail driver (§4.5) that shells out to the
//! system `sendmail` binary with an RFC-5322 message built in-process.

use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

use crate::base::{Connector, ConnectorHandle, ConnectorInit, MailConnector, MailMessage};
use crate::error::ConnectorError;
use crate::registry::ConnectorRegistry;

use super::opt_str;

pub struct SendmailMailer {
    name: String,
    driver: String,
    from_addr: String,
    timeout: Duration,
}

impl SendmailMailer {
    fn open(init: ConnectorInit) -> Result<Self, ConnectorError> {
        let from_addr = opt_str(&init.config, "from_addr").unwrap_or_else(|| "aetherflow@localhost".to_string());
        let timeout_secs = init.config.get("timeout_seconds").and_then(|v| v.as_f64()).unwrap_or(30.0);
        Ok(Self { name: init.name, driver: init.driver, from_addr, timeout: Duration::from_secs_f64(timeout_secs) })
    }

    fn dispatch(&self, msg: &MailMessage, content_type: &str) -> Result<(), ConnectorError> {
        let from_addr = msg.from_addr.unwrap_or(&self.from_addr);
        let message = build_message(from_addr, msg, content_type)?;

        let mut cmd = Command::new("sendmail");
        cmd.arg("-t").arg("-oi").stdin(Stdio::piped());
        let mut child = cmd.spawn().map_err(ConnectorError::Io)?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(message.as_bytes()).map_err(ConnectorError::Io)?;
        }

        let start = std::time::Instant::now();
        loop {
            match child.try_wait().map_err(ConnectorError::Io)? {
                Some(status) if status.success() => return Ok(()),
                Some(status) => {
                    return Err(ConnectorError::Driver {
                        kind: "mail".into(),
                        driver: self.driver.clone(),
                        msg: format!("sendmail exited with {status}"),
                    })
                }
                None => {
                    if start.elapsed() >= self.timeout {
                        let _ = child.kill();
                        return Err(ConnectorError::Timeout { kind: "mail".into(), driver: self.driver.clone(), timeout_secs: self.timeout.as_secs_f64() });
                    }
                    std::thread::sleep(Duration::from_millis(25));
                }
            }
        }
    }
}

fn build_message(from_addr: &str, mail: &MailMessage, content_type: &str) -> Result<String, ConnectorError> {
    let mut msg = String::new();
    msg.push_str(&format!("From: {from_addr}\r\n"));
    msg.push_str(&format!("To: {}\r\n", mail.to.join(", ")));
    if !mail.cc.is_empty() {
        msg.push_str(&format!("Cc: {}\r\n", mail.cc.join(", ")));
    }
    if !mail.bcc.is_empty() {
        msg.push_str(&format!("Bcc: {}\r\n", mail.bcc.join(", ")));
    }
    msg.push_str(&format!("Subject: {}\r\n", mail.subject));
    msg.push_str("MIME-Version: 1.0\r\n");

    if mail.attachments.is_empty() {
        msg.push_str(&format!("Content-Type: {content_type}; charset=UTF-8\r\n\r\n"));
        msg.push_str(mail.body);
        msg.push_str("\r\n");
        return Ok(msg);
    }

    let boundary = "AETHERFLOW-BOUNDARY";
    msg.push_str(&format!("Content-Type: multipart/mixed; boundary=\"{boundary}\"\r\n\r\n"));
    msg.push_str(&format!("--{boundary}\r\n"));
    msg.push_str(&format!("Content-Type: {content_type}; charset=UTF-8\r\n\r\n"));
    msg.push_str(mail.body);
    msg.push_str("\r\n");
    for path in mail.attachments {
        let data = std::fs::read(path).map_err(ConnectorError::Io)?;
        let filename = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        msg.push_str(&format!("--{boundary}\r\n"));
        msg.push_str("Content-Type: application/octet-stream\r\n");
        msg.push_str("Content-Transfer-Encoding: base64\r\n");
        msg.push_str(&format!("Content-Disposition: attachment; filename=\"{filename}\"\r\n\r\n"));
        msg.push_str(&base64_encode(&data));
        msg.push_str("\r\n");
    }
    msg.push_str(&format!("--{boundary}--\r\n"));
    Ok(msg)
}

const B64_ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn base64_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() + 2) / 3 * 4);
    for chunk in data.chunks(3) {
        let b0 = chunk[0];
        let b1 = chunk.get(1).copied();
        let b2 = chunk.get(2).copied();
        out.push(B64_ALPHABET[(b0 >> 2) as usize] as char);
        out.push(B64_ALPHABET[(((b0 & 0x03) << 4) | (b1.unwrap_or(0) >> 4)) as usize] as char);
        out.push(if let Some(b1) = b1 {
            B64_ALPHABET[(((b1 & 0x0f) << 2) | (b2.unwrap_or(0) >> 6)) as usize] as char
        } else {
            '='
        });
        out.push(if let Some(b2) = b2 { B64_ALPHABET[(b2 & 0x3f) as usize] as char } else { '=' });
    }
    out
}

impl Connector for SendmailMailer {
    fn name(&self) -> &str {
        &self.name
    }
    fn kind(&self) -> &str {
        "mail"
    }
    fn driver(&self) -> &str {
        &self.driver
    }
}

impl MailConnector for SendmailMailer {
    fn send_plaintext(&self, msg: &MailMessage) -> Result<(), ConnectorError> {
        self.dispatch(msg, "text/plain")
    }

    fn send_html(&self, msg: &MailMessage) -> Result<(), ConnectorError> {
        self.dispatch(msg, "text/html")
    }
}

pub fn register(registry: &ConnectorRegistry) {
    registry.register("mail", "sendmail", |init: ConnectorInit| {
        Ok(ConnectorHandle::Mail(Arc::new(SendmailMailer::open(init)?) as Arc<dyn MailConnector>))
    });
}

#[cfg(test)]
#[path = "mail_tests.rs"]
mod tests;
