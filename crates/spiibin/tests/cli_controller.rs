#![cfg(all(unix, feature = "cli"))]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process::Command;
use std::thread;

const ACK: u8 = 0x06;

/// Read one request frame: header, body, trailer.
fn read_request(stream: &mut TcpStream) -> Option<(u8, Vec<u8>)> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).ok()?;
    let len = u16::from_le_bytes([header[2], header[3]]) as usize;
    let mut rest = vec![0u8; len + 1];
    stream.read_exact(&mut rest).ok()?;
    rest.pop();
    Some((header[1], rest))
}

fn data_reply(opcode: u8, data: &[u8]) -> Vec<u8> {
    let len = (data.len() as u16).to_le_bytes();
    let mut reply = vec![0xE3, opcode, len[0], len[1]];
    reply.extend_from_slice(data);
    reply.push(0xE6);
    reply
}

fn spawn_controller<F>(handler: F) -> (String, thread::JoinHandle<Vec<(u8, Vec<u8>)>>)
where
    F: Fn(u8, &[u8]) -> Vec<u8> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let addr = listener.local_addr().expect("local addr").to_string();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let mut seen = Vec::new();
        while let Some((opcode, body)) = read_request(&mut stream) {
            let reply = handler(opcode, &body);
            seen.push((opcode, body));
            if stream.write_all(&reply).is_err() {
                break;
            }
        }
        seen
    });
    (addr, handle)
}

#[test]
fn read_prints_values() {
    let (addr, controller) = spawn_controller(|opcode, _| {
        let data: Vec<u8> = (0..8).flat_map(|i| (f64::from(i) * 1.5).to_le_bytes()).collect();
        data_reply(opcode, &data)
    });

    let output = Command::new(env!("CARGO_BIN_EXE_spiibin"))
        .args(["--log-level", "error", "--format", "json", "read"])
        .arg(&addr)
        .args(["--var", "APOS", "--dim1", "0,7"])
        .output()
        .expect("read should run");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"values\":[0.0,1.5,3.0,4.5,6.0,7.5,9.0,10.5]"));

    let seen = controller.join().expect("controller thread");
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, 0xF0);
    assert_eq!(&seen[0].1[..4], b"%??\x08");
}

#[test]
fn read_controller_error_exits_40() {
    let (addr, controller) = spawn_controller(|opcode, _| {
        vec![0xE3, opcode, b'6', b'?', b'1', b'0', b'6', b'4', 0x0D, 0xE6]
    });

    let output = Command::new(env!("CARGO_BIN_EXE_spiibin"))
        .args(["--log-level", "error", "--array-timeout", "1s", "read"])
        .arg(&addr)
        .args(["--var", "MISSING", "--dim1", "0,7"])
        .output()
        .expect("read should run");

    assert_eq!(output.status.code(), Some(40));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("#1064"));
    controller.join().expect("controller thread");
}

#[test]
fn write_sends_every_slice() {
    let (addr, controller) = spawn_controller(|opcode, _| vec![ACK, opcode]);

    let values: Vec<String> = (0..2000).map(|i| i.to_string()).collect();
    let output = Command::new(env!("CARGO_BIN_EXE_spiibin"))
        .args(["--log-level", "error", "--format", "json", "write"])
        .arg(&addr)
        .args(["--var", "PROFILE", "--dim1", "0,1999", "--values"])
        .arg(values.join(","))
        .output()
        .expect("write should run");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"packets\":12"));
    assert!(stdout.contains("\"wraps\":1"));

    let seen = controller.join().expect("controller thread");
    assert_eq!(seen.len(), 12);
    assert!(seen.iter().all(|(opcode, _)| *opcode == 0x37));
    assert_eq!(&seen[10].1[..2], b"%0");
}
