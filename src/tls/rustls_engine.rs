// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! rustls-backed [`TlsEngine`].
//!
//! Bridges rustls's buffered-connection model onto the status-code engine
//! contract: `wrap` feeds plaintext to the connection writer and drains
//! `write_tls` into the destination plane; `unwrap` feeds `read_tls`, runs
//! `process_new_packets`, and drains the plaintext reader. Handshake status
//! derives from `is_handshaking`/`wants_write` (rustls never delegates
//! tasks).
//!
//! Certificate and trust configuration stay with the caller: the engine
//! accepts prebuilt `Arc<ServerConfig>`/`Arc<ClientConfig>`.

use std::io::{self, Read, Write};
use std::sync::Arc;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, ServerConfig, ServerConnection};

use super::engine::{EngineResult, EngineStatus, EngineTask, HandshakeStatus, TlsEngine};
use super::TlsError;

/// Largest TLS record (2^14 payload) plus header/MAC/padding expansion.
const MAX_RECORD_SIZE: usize = 16 * 1024 + 2048;

/// Plaintext ceiling per wrap call, so one call emits at most one record.
const MAX_PLAINTEXT_CHUNK: usize = 16 * 1024;

/// Client or server side of a rustls connection.
enum Conn {
    Client(ClientConnection),
    Server(ServerConnection),
}

impl Conn {
    fn is_handshaking(&self) -> bool {
        match self {
            Conn::Client(c) => c.is_handshaking(),
            Conn::Server(c) => c.is_handshaking(),
        }
    }

    fn wants_write(&self) -> bool {
        match self {
            Conn::Client(c) => c.wants_write(),
            Conn::Server(c) => c.wants_write(),
        }
    }

    fn read_tls(&mut self, rd: &mut dyn Read) -> io::Result<usize> {
        match self {
            Conn::Client(c) => c.read_tls(rd),
            Conn::Server(c) => c.read_tls(rd),
        }
    }

    fn write_tls(&mut self, wr: &mut dyn Write) -> io::Result<usize> {
        match self {
            Conn::Client(c) => c.write_tls(wr),
            Conn::Server(c) => c.write_tls(wr),
        }
    }

    fn process_new_packets(&mut self) -> Result<rustls::IoState, rustls::Error> {
        match self {
            Conn::Client(c) => c.process_new_packets(),
            Conn::Server(c) => c.process_new_packets(),
        }
    }

    fn write_plaintext(&mut self, src: &[u8]) -> io::Result<usize> {
        match self {
            Conn::Client(c) => c.writer().write(src),
            Conn::Server(c) => c.writer().write(src),
        }
    }

    fn read_plaintext(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        match self {
            Conn::Client(c) => c.reader().read(dst),
            Conn::Server(c) => c.reader().read(dst),
        }
    }

    fn send_close_notify(&mut self) {
        match self {
            Conn::Client(c) => c.send_close_notify(),
            Conn::Server(c) => c.send_close_notify(),
        }
    }
}

/// Fixed-slice sink for `write_tls`; reports `WouldBlock` when full so the
/// drain loop stops instead of truncating a record.
struct SliceWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl Write for SliceWriter<'_> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let space = self.buf.len() - self.pos;
        if space == 0 {
            return Err(io::Error::new(io::ErrorKind::WouldBlock, "plane full"));
        }
        let n = data.len().min(space);
        self.buf[self.pos..self.pos + n].copy_from_slice(&data[..n]);
        self.pos += n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// [`TlsEngine`] implementation backed by rustls.
pub struct RustlsEngine {
    conn: Conn,
}

impl RustlsEngine {
    /// Client-side engine. `server_name` drives SNI and verification.
    pub fn client(
        config: Arc<ClientConfig>,
        server_name: ServerName<'static>,
    ) -> Result<Self, TlsError> {
        let conn = ClientConnection::new(config, server_name)
            .map_err(|e| TlsError::Engine(e.to_string()))?;
        Ok(Self {
            conn: Conn::Client(conn),
        })
    }

    /// Server-side engine.
    pub fn server(config: Arc<ServerConfig>) -> Result<Self, TlsError> {
        let conn =
            ServerConnection::new(config).map_err(|e| TlsError::Engine(e.to_string()))?;
        Ok(Self {
            conn: Conn::Server(conn),
        })
    }

    fn current_status(&self) -> HandshakeStatus {
        if !self.conn.is_handshaking() {
            HandshakeStatus::NotHandshaking
        } else if self.conn.wants_write() {
            HandshakeStatus::NeedWrap
        } else {
            HandshakeStatus::NeedUnwrap
        }
    }

    /// Drain pending TLS bytes into `dst`, returning bytes produced.
    fn drain_tls(&mut self, dst: &mut [u8]) -> Result<usize, TlsError> {
        let mut writer = SliceWriter { buf: dst, pos: 0 };
        while self.conn.wants_write() {
            match self.conn.write_tls(&mut writer) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(TlsError::Io(e)),
            }
        }
        Ok(writer.pos)
    }
}

impl TlsEngine for RustlsEngine {
    fn begin_handshake(&mut self) -> Result<(), TlsError> {
        // rustls handshakes implicitly from construction.
        Ok(())
    }

    fn wrap(&mut self, src: &[u8], dst: &mut [u8]) -> Result<EngineResult, TlsError> {
        let mut consumed = 0;
        if !src.is_empty() {
            let take = src.len().min(MAX_PLAINTEXT_CHUNK);
            consumed = self
                .conn
                .write_plaintext(&src[..take])
                .map_err(TlsError::Io)?;
        }

        let produced = self.drain_tls(dst)?;

        Ok(EngineResult {
            status: EngineStatus::Ok,
            handshake: self.current_status(),
            consumed,
            produced,
        })
    }

    fn unwrap(&mut self, src: &[u8], dst: &mut [u8]) -> Result<EngineResult, TlsError> {
        let mut rd: &[u8] = src;
        let mut consumed = 0;
        while !rd.is_empty() {
            match self.conn.read_tls(&mut rd) {
                Ok(0) => break,
                Ok(n) => consumed += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(TlsError::Io(e)),
            }
        }

        let state = self
            .conn
            .process_new_packets()
            .map_err(|e| TlsError::Engine(e.to_string()))?;
        let pending = state.plaintext_bytes_to_read();

        let mut produced = 0;
        let mut saw_eof = false;
        while produced < dst.len() {
            match self.conn.read_plaintext(&mut dst[produced..]) {
                Ok(0) => {
                    saw_eof = true;
                    break;
                }
                Ok(n) => produced += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    saw_eof = true;
                    break;
                }
                Err(e) => return Err(TlsError::Io(e)),
            }
        }

        let status = if produced < pending {
            EngineStatus::BufferOverflow
        } else if saw_eof || state.peer_has_closed() {
            EngineStatus::Closed
        } else {
            EngineStatus::Ok
        };

        Ok(EngineResult {
            status,
            handshake: self.current_status(),
            consumed,
            produced,
        })
    }

    fn delegated_task(&mut self) -> Option<EngineTask> {
        None
    }

    fn handshake_status(&self) -> HandshakeStatus {
        self.current_status()
    }

    fn packet_size(&self) -> usize {
        MAX_RECORD_SIZE
    }

    fn close_outbound(&mut self) {
        self.conn.send_close_notify();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};

    /// Accept-anything verifier for self-signed test certificates.
    #[derive(Debug)]
    struct NoVerifier;

    impl rustls::client::danger::ServerCertVerifier for NoVerifier {
        fn verify_server_cert(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            _server_name: &ServerName<'_>,
            _ocsp_response: &[u8],
            _now: rustls::pki_types::UnixTime,
        ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
            Ok(rustls::client::danger::ServerCertVerified::assertion())
        }

        fn verify_tls12_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &rustls::DigitallySignedStruct,
        ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
            Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
        }

        fn verify_tls13_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &rustls::DigitallySignedStruct,
        ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
            Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
        }

        fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
            vec![
                rustls::SignatureScheme::RSA_PKCS1_SHA256,
                rustls::SignatureScheme::RSA_PKCS1_SHA384,
                rustls::SignatureScheme::RSA_PKCS1_SHA512,
                rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
                rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
                rustls::SignatureScheme::RSA_PSS_SHA256,
                rustls::SignatureScheme::RSA_PSS_SHA384,
                rustls::SignatureScheme::RSA_PSS_SHA512,
                rustls::SignatureScheme::ED25519,
            ]
        }
    }

    pub(crate) fn test_configs() -> (Arc<ServerConfig>, Arc<ClientConfig>) {
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
            .expect("generate self-signed cert");
        let cert_der = CertificateDer::from(cert.cert.der().to_vec());
        let key = PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());

        let server = ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![cert_der], PrivateKeyDer::Pkcs8(key))
            .expect("server config");

        let client = ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerifier))
            .with_no_client_auth();

        (Arc::new(server), Arc::new(client))
    }

    pub(crate) fn engine_pair() -> (RustlsEngine, RustlsEngine) {
        let (server_cfg, client_cfg) = test_configs();
        let server = RustlsEngine::server(server_cfg).unwrap();
        let client = RustlsEngine::client(
            client_cfg,
            ServerName::try_from("localhost".to_string()).unwrap(),
        )
        .unwrap();
        (server, client)
    }

    /// Shuttle handshake records between two engines until both settle.
    fn drive_handshake(a: &mut RustlsEngine, b: &mut RustlsEngine) {
        let mut wire = vec![0u8; MAX_RECORD_SIZE];
        let mut sink = vec![0u8; MAX_RECORD_SIZE];

        for _ in 0..20 {
            loop {
                let out = a.wrap(&[], &mut wire).unwrap();
                if out.produced == 0 {
                    break;
                }
                b.unwrap(&wire[..out.produced], &mut sink).unwrap();
            }
            loop {
                let out = b.wrap(&[], &mut wire).unwrap();
                if out.produced == 0 {
                    break;
                }
                a.unwrap(&wire[..out.produced], &mut sink).unwrap();
            }
            if a.handshake_status() == HandshakeStatus::NotHandshaking
                && b.handshake_status() == HandshakeStatus::NotHandshaking
            {
                return;
            }
        }
        panic!("handshake did not settle");
    }

    #[test]
    fn test_initial_statuses() {
        let (server, client) = engine_pair();
        // Client opens; server waits for the hello.
        assert_eq!(client.handshake_status(), HandshakeStatus::NeedWrap);
        assert_eq!(server.handshake_status(), HandshakeStatus::NeedUnwrap);
    }

    #[test]
    fn test_handshake_settles() {
        let (mut server, mut client) = engine_pair();
        drive_handshake(&mut client, &mut server);
        assert_eq!(client.handshake_status(), HandshakeStatus::NotHandshaking);
        assert_eq!(server.handshake_status(), HandshakeStatus::NotHandshaking);
    }

    #[test]
    fn test_plaintext_round_trip() {
        let (mut server, mut client) = engine_pair();
        drive_handshake(&mut client, &mut server);

        let mut wire = vec![0u8; MAX_RECORD_SIZE];
        let out = client.wrap(b"application bytes", &mut wire).unwrap();
        assert_eq!(out.consumed, 17);
        assert!(out.produced > 17); // record framing adds overhead

        let mut plain = vec![0u8; MAX_RECORD_SIZE];
        let res = server.unwrap(&wire[..out.produced], &mut plain).unwrap();
        assert_eq!(res.status, EngineStatus::Ok);
        assert_eq!(&plain[..res.produced], b"application bytes");
    }

    #[test]
    fn test_partial_record_reports_no_plaintext() {
        let (mut server, mut client) = engine_pair();
        drive_handshake(&mut client, &mut server);

        let mut wire = vec![0u8; MAX_RECORD_SIZE];
        let out = client.wrap(b"chopped", &mut wire).unwrap();

        let mut plain = vec![0u8; MAX_RECORD_SIZE];
        let half = out.produced / 2;
        let res = server.unwrap(&wire[..half], &mut plain).unwrap();
        assert_eq!(res.produced, 0);

        // Remainder completes the record.
        let res = server.unwrap(&wire[half..out.produced], &mut plain).unwrap();
        assert_eq!(&plain[..res.produced], b"chopped");
    }

    #[test]
    fn test_close_notify_reports_closed() {
        let (mut server, mut client) = engine_pair();
        drive_handshake(&mut client, &mut server);

        client.close_outbound();
        let mut wire = vec![0u8; MAX_RECORD_SIZE];
        let out = client.wrap(&[], &mut wire).unwrap();
        assert!(out.produced > 0);

        let mut plain = vec![0u8; MAX_RECORD_SIZE];
        let res = server.unwrap(&wire[..out.produced], &mut plain).unwrap();
        assert_eq!(res.status, EngineStatus::Closed);
    }

    #[test]
    fn test_packet_size_bounds_one_record() {
        let (server, _) = engine_pair();
        assert!(server.packet_size() >= MAX_PLAINTEXT_CHUNK);
    }
}
