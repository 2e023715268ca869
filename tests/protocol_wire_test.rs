use relcore::config::EngineConfig;
use relcore::engine::Engine;
use relcore::protocol::opcode::{Opcode, HANDSHAKE_MAGIC, SERVER_VERSION};
use relcore::protocol::{Connection, ConnectionState};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

fn frame(payload: Vec<u8>) -> Vec<u8> {
    let mut out = (payload.len() as u32).to_be_bytes().to_vec();
    out.extend(payload);
    out
}

fn write_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend((s.len() as u16).to_be_bytes());
    buf.extend(s.as_bytes());
}

async fn read_frame(stream: &mut TcpStream) -> Vec<u8> {
    let mut len = [0u8; 4];
    stream.read_exact(&mut len).await.unwrap();
    let mut buf = vec![0u8; u32::from_be_bytes(len) as usize];
    stream.read_exact(&mut buf).await.unwrap();
    buf
}

/// Drives a real loopback TCP connection through the whole protocol state
/// machine: handshake, login, a QUERY, a result dispose, and close.
#[tokio::test]
async fn handshake_login_query_dispose_close_round_trip() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let engine = Engine::new(EngineConfig::default());

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut conn = Connection::new(engine);
        conn.serve(&mut socket).await.ok();
        conn.state
    });

    let mut client = TcpStream::connect(addr).await.unwrap();

    let mut handshake = HANDSHAKE_MAGIC.to_be_bytes().to_vec();
    handshake.extend(1u32.to_be_bytes());
    handshake.extend(0u32.to_be_bytes());
    client.write_all(&frame(handshake)).await.unwrap();
    let ack = read_frame(&mut client).await;
    assert_eq!(i32::from_be_bytes(ack[0..4].try_into().unwrap()), Opcode::Acknowledgement as i32);
    assert_eq!(u32::from_be_bytes(ack[5..9].try_into().unwrap()), SERVER_VERSION);

    let mut login = Vec::new();
    write_str(&mut login, "public");
    write_str(&mut login, "admin");
    write_str(&mut login, "secret");
    client.write_all(&frame(login)).await.unwrap();
    let login_resp = read_frame(&mut client).await;
    assert_eq!(i32::from_be_bytes(login_resp[0..4].try_into().unwrap()), Opcode::UserAuthenticationPassed as i32);

    let mut query = 7i32.to_be_bytes().to_vec();
    query.extend((Opcode::Query as i32).to_be_bytes());
    write_str(&mut query, "CREATE TABLE t (id INTEGER PRIMARY KEY)");
    query.extend(0u32.to_be_bytes());
    client.write_all(&frame(query)).await.unwrap();
    let query_resp = read_frame(&mut client).await;
    assert_eq!(i32::from_be_bytes(query_resp[0..4].try_into().unwrap()), Opcode::Success as i32);

    let mut dispose = 8i32.to_be_bytes().to_vec();
    dispose.extend((Opcode::DisposeResult as i32).to_be_bytes());
    dispose.extend(1u32.to_be_bytes());
    client.write_all(&frame(dispose)).await.unwrap();
    let _dispose_resp = read_frame(&mut client).await;

    let mut close = 9i32.to_be_bytes().to_vec();
    close.extend((Opcode::Close as i32).to_be_bytes());
    client.write_all(&frame(close)).await.unwrap();

    let final_state = server.await.unwrap();
    assert_eq!(final_state, ConnectionState::Closed);
}

/// A client sending the wrong handshake magic is refused before login.
#[tokio::test]
async fn bad_handshake_magic_is_rejected() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let engine = Engine::new(EngineConfig::default());

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut conn = Connection::new(engine);
        conn.serve(&mut socket).await
    });

    let mut client = TcpStream::connect(addr).await.unwrap();
    let mut bad = 0xDEAD_BEEFu32.to_be_bytes().to_vec();
    bad.extend(1u32.to_be_bytes());
    bad.extend(0u32.to_be_bytes());
    client.write_all(&frame(bad)).await.unwrap();
    drop(client);

    assert!(server.await.unwrap().is_err());
}
