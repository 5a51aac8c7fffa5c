//! Shared mock-server plumbing for the integration tests: a loopback
//! listener plus helpers for reading a request and writing back a
//! scripted wire response, built from the crate's own `wire` types
//! rather than a second hand-rolled codec.

use std::time::Duration;

use kvproto_client::wire::{Field, HEADER_LEN, Header, Op};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

/// Binds an ephemeral loopback listener and returns its `host:port`.
pub async fn bind() -> (String, TcpListener) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
    let addr = listener.local_addr().expect("local_addr");
    (addr.to_string(), listener)
}

/// Reads one full wire message off `stream`: the 30-byte header plus
/// whatever body bytes `body_length` declares.
pub async fn read_request(stream: &mut TcpStream) -> (Header, Vec<u8>) {
    let mut header_buf = [0u8; HEADER_LEN];
    stream.read_exact(&mut header_buf).await.expect("read request header");
    let header = Header::decode(&header_buf).expect("decode request header");
    let body_len = (header.body_length as usize).saturating_sub(22);
    let mut body = vec![0u8; body_len];
    if body_len > 0 {
        stream.read_exact(&mut body).await.expect("read request body");
    }
    (header, body)
}

/// The handful of header knobs a scripted response needs to set; every
/// other header field is a fixed, uninteresting default.
#[derive(Clone, Copy)]
pub struct RespHeader {
    pub info3: u8,
    pub result_code: u8,
    pub generation: u32,
    pub expiration: u32,
}

impl Default for RespHeader {
    fn default() -> Self {
        RespHeader { info3: 0, result_code: 0, generation: 1, expiration: 0 }
    }
}

/// Encodes one full wire response message (30-byte header, fields, ops).
pub fn build_message(rh: RespHeader, fields: &[Field], ops: &[Op]) -> Vec<u8> {
    let mut body = Vec::new();
    for field in fields {
        field.encode(&mut body);
    }
    for op in ops {
        op.encode(&mut body);
    }
    let mut out = vec![0u8; HEADER_LEN];
    let header = Header {
        header_len: 22,
        info1: 0,
        info2: 0,
        info3: rh.info3,
        result_code: rh.result_code,
        generation: rh.generation,
        expiration: rh.expiration,
        transaction_ttl: 0,
        field_count: fields.len() as u16,
        op_count: ops.len() as u16,
        body_length: 0,
    };
    header.encode(&mut out, 22 + body.len() as u64);
    out.extend_from_slice(&body);
    out
}

/// A response with no fields or ops — for write acknowledgements
/// (`Put`/`Delete`/`Exists`/`Append`).
pub fn empty_message(result_code: u8) -> Vec<u8> {
    build_message(RespHeader { result_code, ..Default::default() }, &[], &[])
}

/// An 8-byte keep-alive ping: a bare protocol prefix with `length == 0`
/// and no extended header or body. Spec §4.5 step 8 Phase A / §8 say
/// receiving one does not terminate the read — the client re-reads a
/// fresh prefix. Prepend this to a real message's bytes to exercise that.
pub fn keepalive_ping() -> Vec<u8> {
    vec![2, 3, 0, 0, 0, 0, 0, 0]
}

pub fn int_op(name: &str, v: i64) -> Op {
    Op { op_type: 0, particle_type: 1, name: name.to_string(), value: v.to_be_bytes().to_vec() }
}

pub fn string_op(name: &str, v: &str) -> Op {
    Op { op_type: 0, particle_type: 3, name: name.to_string(), value: v.as_bytes().to_vec() }
}

/// Accepts exactly one connection and replies to its requests in order,
/// one `script` entry per request. Every command in a test that runs
/// sequentially against a single-node cluster ends up sharing this one
/// pooled connection, since each command returns it before the next one
/// asks for it back.
pub fn serve_script(listener: TcpListener, script: Vec<Vec<u8>>) {
    tokio::spawn(async move {
        let Ok((mut stream, _)) = listener.accept().await else { return };
        for reply in script {
            let _ = read_request(&mut stream).await;
            let _ = stream.write_all(&reply).await;
            let _ = stream.flush().await;
        }
    });
}

/// Accepts exactly one connection, reads exactly one request off it, then
/// writes every entry of `replies` back to back without waiting for
/// further requests — for multi-record streams (scan/query) where one
/// request is answered by many discrete wire messages, and for batch's
/// single envelope (`replies.len() == 1`).
pub fn serve_single_request_multi_reply(listener: TcpListener, replies: Vec<Vec<u8>>) {
    tokio::spawn(async move {
        let Ok((mut stream, _)) = listener.accept().await else { return };
        let _ = read_request(&mut stream).await;
        for reply in replies {
            let _ = stream.write_all(&reply).await;
        }
        let _ = stream.flush().await;
    });
}

/// Accepts exactly one connection, reads its request, then waits `delay`
/// before writing `reply` — a server that answers, just far later than a
/// command's timeout (spec §8 scenario 5 "server artificially delays >
/// timeout_ms"). Used to exercise the timeout supervisor's forced close
/// against a peer that never appears to hang up, only to respond late.
pub fn serve_with_delay(listener: TcpListener, delay: Duration, reply: Vec<u8>) {
    tokio::spawn(async move {
        let Ok((mut stream, _)) = listener.accept().await else { return };
        let _ = read_request(&mut stream).await;
        tokio::time::sleep(delay).await;
        let _ = stream.write_all(&reply).await;
        let _ = stream.flush().await;
    });
}

/// Like [`serve_script`] but drops the first `drop_count` connections
/// (reading their request, then closing without replying) before
/// serving `script` on the connection accepted after that — used to
/// exercise the client's retry-on-connection-drop path (spec §4.5
/// "connection disposition on error" feeding back into §3's retry loop).
pub fn serve_after_drops(listener: TcpListener, drop_count: usize, script: Vec<Vec<u8>>) {
    tokio::spawn(async move {
        for _ in 0..drop_count {
            let Ok((mut stream, _)) = listener.accept().await else { return };
            let _ = read_request(&mut stream).await;
            // `stream` drops here, closing the socket without a reply.
        }
        let Ok((mut stream, _)) = listener.accept().await else { return };
        for reply in script {
            let _ = read_request(&mut stream).await;
            let _ = stream.write_all(&reply).await;
            let _ = stream.flush().await;
        }
    });
}
