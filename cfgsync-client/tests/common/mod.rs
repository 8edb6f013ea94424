#![allow(dead_code)]

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub type Args = Vec<Vec<u8>>;

/// Fake server answering one command per connection, for `connections`
/// connections. Join the handle to surface assertion failures.
pub fn spawn_server(
    connections: usize,
    handler: fn(usize, Args, &mut TcpStream),
) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr").to_string();

    let handle = thread::spawn(move || {
        for idx in 0..connections {
            let (mut stream, _) = listener.accept().expect("accept");
            let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
            let mut reader = BufReader::new(stream.try_clone().expect("clone"));
            let args = read_command(&mut reader).expect("read command");
            handler(idx, args, &mut stream);
        }
    });

    (addr, handle)
}

/// Address nothing is listening on.
pub fn closed_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().expect("addr").to_string()
}

/// Reads SUBSCRIBE from a fresh connection and confirms it.
pub fn accept_subscriber(listener: &TcpListener) -> (TcpStream, BufReader<TcpStream>) {
    let (mut stream, _) = listener.accept().expect("accept");
    let mut reader = BufReader::new(stream.try_clone().expect("clone"));
    let args = read_command(&mut reader).expect("read SUBSCRIBE");
    assert_eq!(args[0], b"SUBSCRIBE");
    write_push(&mut stream, &[b"subscribe", &args[1]], Some(1));
    (stream, reader)
}

/// Blocks until the client goes away, answering PINGs when `answer_pings`.
/// Returns how many PINGs arrived.
pub fn serve_until_eof(stream: &mut TcpStream, reader: &mut BufReader<TcpStream>, answer_pings: bool) -> usize {
    let mut pings = 0;
    while let Ok(args) = read_command(reader) {
        if args[0] == b"PING" {
            pings += 1;
            if answer_pings {
                write_push(stream, &[b"pong", b""], None);
            }
        }
    }
    pings
}

/// Reads one command: an array of bulk strings.
pub fn read_command(reader: &mut BufReader<TcpStream>) -> io::Result<Args> {
    let count = read_header(reader, '*')?;
    (0..count).map(|_| read_bulk_arg(reader)).collect()
}

fn read_bulk_arg(reader: &mut BufReader<TcpStream>) -> io::Result<Vec<u8>> {
    let len = read_header(reader, '$')?;
    let mut data = vec![0u8; len + 2];
    reader.read_exact(&mut data)?;
    if !data.ends_with(b"\r\n") {
        return Err(malformed("bulk argument without CRLF"));
    }
    data.truncate(len);
    Ok(data)
}

/// Reads a `<marker><count>\r\n` line and returns the count.
fn read_header(reader: &mut BufReader<TcpStream>, marker: char) -> io::Result<usize> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "client hung up"));
    }
    line.strip_suffix("\r\n")
        .and_then(|line| line.strip_prefix(marker))
        .and_then(|count| count.parse().ok())
        .ok_or_else(|| malformed(&format!("bad `{}` header: {:?}", marker, line)))
}

fn malformed(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.to_string())
}

pub fn write_raw(stream: &mut TcpStream, data: &[u8]) {
    let _ = stream.write_all(data);
    let _ = stream.flush();
}

pub fn write_simple(stream: &mut TcpStream, msg: &str) {
    write_raw(stream, format!("+{}\r\n", msg).as_bytes());
}

pub fn write_error(stream: &mut TcpStream, msg: &str) {
    write_raw(stream, format!("-{}\r\n", msg).as_bytes());
}

pub fn write_integer(stream: &mut TcpStream, value: i64) {
    write_raw(stream, format!(":{}\r\n", value).as_bytes());
}

pub fn write_bulk(stream: &mut TcpStream, data: &[u8]) {
    let mut frame = format!("${}\r\n", data.len()).into_bytes();
    frame.extend_from_slice(data);
    frame.extend_from_slice(b"\r\n");
    write_raw(stream, &frame);
}

pub fn write_null_bulk(stream: &mut TcpStream) {
    write_raw(stream, b"$-1\r\n");
}

/// Writes an array of bulk strings, optionally followed by a trailing integer
/// (the subscription count in `subscribe` confirmations).
pub fn write_push(stream: &mut TcpStream, items: &[&[u8]], count: Option<i64>) {
    let len = items.len() + usize::from(count.is_some());
    let mut frame = format!("*{}\r\n", len).into_bytes();
    for item in items {
        frame.extend_from_slice(format!("${}\r\n", item.len()).as_bytes());
        frame.extend_from_slice(item);
        frame.extend_from_slice(b"\r\n");
    }
    if let Some(count) = count {
        frame.extend_from_slice(format!(":{}\r\n", count).as_bytes());
    }
    write_raw(stream, &frame);
}

pub fn write_message(stream: &mut TcpStream, channel: &str, payload: &[u8]) {
    write_push(stream, &[b"message", channel.as_bytes(), payload], None);
}
