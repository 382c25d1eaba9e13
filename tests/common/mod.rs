#![allow(dead_code)]

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use flate2::Compression;
use flate2::write::GzEncoder;

/// Little-endian NIfTI-1 header with the given dimension array.
pub fn nifti1_header(dims: [i16; 8]) -> Vec<u8> {
    let mut header = vec![0u8; 348];
    header[0..4].copy_from_slice(&348i32.to_le_bytes());
    for (index, dim) in dims.iter().enumerate() {
        let offset = 40 + 2 * index;
        header[offset..offset + 2].copy_from_slice(&dim.to_le_bytes());
    }
    header[70..72].copy_from_slice(&16i16.to_le_bytes());
    header[72..74].copy_from_slice(&32i16.to_le_bytes());
    for index in 0..8 {
        let offset = 76 + 4 * index;
        header[offset..offset + 4].copy_from_slice(&1.0f32.to_le_bytes());
    }
    header[108..112].copy_from_slice(&352.0f32.to_le_bytes());
    header[112..116].copy_from_slice(&1.0f32.to_le_bytes());
    header[344..348].copy_from_slice(b"n+1\0");
    header
}

/// A whole `.nii.gz` file: header, empty extension block and `volume_bytes` of noise.
pub fn nifti_gz(timepoints: i16, volume_bytes: usize) -> Vec<u8> {
    let mut raw = nifti1_header([4, 4, 4, 2, timepoints, 1, 1, 1]);
    raw.extend_from_slice(&[0, 0, 0, 0]);
    let mut state: u32 = 0x2545_f491;
    raw.extend((0..volume_bytes).map(|_| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        (state >> 24) as u8
    }));
    gzip(&raw)
}

pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

/// Serves exactly one HTTP request with the given status line and body.
/// The join handle yields the raw request head.
pub fn serve_once(status_line: &str, body: Vec<u8>) -> (String, JoinHandle<String>) {
    let (url, handle) = serve_sequence(vec![(status_line.to_string(), body)]);
    let handle = thread::spawn(move || handle.join().unwrap().remove(0));
    (url, handle)
}

/// Serves one connection per response, in order. The join handle yields the
/// request heads received.
pub fn serve_sequence(responses: Vec<(String, Vec<u8>)>) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = thread::spawn(move || {
        let mut requests = Vec::new();
        for (status_line, body) in responses {
            let (mut stream, _) = listener.accept().unwrap();
            requests.push(read_request_head(&mut stream));
            // The client may stop reading once it has what it asked for.
            let _ = write_response(&mut stream, &status_line, &body);
        }
        requests
    });
    (format!("http://{addr}"), handle)
}

/// Accepts one connection and closes it without answering. The join handle
/// yields the number of connections accepted before the listener is dropped.
pub fn serve_hangup() -> (String, JoinHandle<usize>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        read_request_head(&mut stream);
        drop(stream);
        listener.set_nonblocking(true).unwrap();
        thread::sleep(Duration::from_millis(500));
        1 + listener.incoming().take_while(Result::is_ok).count()
    });
    (format!("http://{addr}"), handle)
}

fn write_response(stream: &mut TcpStream, status_line: &str, body: &[u8]) -> io::Result<()> {
    let head = format!(
        "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    stream.write_all(head.as_bytes())?;
    stream.write_all(body)?;
    stream.flush()
}

fn read_request_head(stream: &mut TcpStream) -> String {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|window| window == b"\r\n\r\n") {
        let read = stream.read(&mut buf).unwrap_or(0);
        if read == 0 {
            break;
        }
        request.extend_from_slice(&buf[..read]);
    }
    String::from_utf8_lossy(&request).to_string()
}
