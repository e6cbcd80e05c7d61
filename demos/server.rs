//! Example: Minimal command responder
//!
//! Accepts legacy OP_QUERY commands and answers enough of them (isMaster,
//! whatsmyuri, getLog, listDatabases, ...) for a shell to connect. Anything
//! else gets a "no such cmd" reply.
//!
//! Usage:
//!   cargo run --example server

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::net::TcpListener;
use std::thread;

use bson::{Document, doc};
use zero_mongo::sync::{Conn, Stream};
use zero_mongo::{BsonCodec, CursorId, Error, Message, Opts};

fn command_reply(request: &Message<Document>, peer: &str) -> Option<Vec<Document>> {
    let query = request.document("query")?;

    if request.cstring("fullCollectionName") == Some("test.system.namespaces") {
        return Some(vec![doc! { "name": "test.system.indexes" }]);
    }

    if query.contains_key("listCollections") {
        return Some(vec![
            doc! { "name": "test.system.indexes" },
            doc! { "name": "test.system.namespaces" },
        ]);
    }

    let reply = if query.contains_key("listDatabases") {
        doc! {
            "databases": [
                { "name": "test", "sizeOnDisk": 2_097_152_000_i64, "empty": false },
                { "name": "admin", "sizeOnDisk": 1, "empty": true },
            ],
            "totalSize": 2_097_152_000_i64,
            "ok": 1,
        }
    } else if query.contains_key("isMaster") {
        doc! {
            "ismaster": true,
            "maxBsonObjectSize": 16_777_216,
            "maxMessageSizeBytes": 48_000_000,
            "maxWriteBatchSize": 1000,
            "localTime": bson::DateTime::now(),
            "maxWireVersion": 2,
            "minWireVersion": 0,
            "ok": 1,
        }
    } else if query.contains_key("replSetGetStatus") {
        doc! { "ok": 0, "errmsg": "not running with --replSet" }
    } else if query.contains_key("getLog") {
        doc! { "totalLinesWritten": 0, "log": [], "ok": 1 }
    } else if query.contains_key("whatsmyuri") {
        doc! { "you": peer, "ok": 1 }
    } else {
        let name = query.keys().next().cloned().unwrap_or_default();
        doc! {
            "ok": 0,
            "errmsg": format!("no such cmd: {name}"),
            "code": 59,
            "bad cmd": query.clone(),
        }
    };
    Some(vec![reply])
}

fn serve(mut conn: Conn<BsonCodec>) -> zero_mongo::Result<()> {
    let peer = conn
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_default();

    loop {
        let request = match conn.recv() {
            Ok(request) => request,
            Err(Error::ConnectionClosed) => return Ok(()),
            Err(e) => return Err(e),
        };
        println!(
            "Request length: {}, id: {}, responseTo: {}, opCode: {}",
            request.header().message_length,
            request.request_id(),
            request.response_to(),
            request.op_code()
        );
        for (name, value) in request.fields() {
            println!("  {name}: {value:?}");
        }

        if let Some(documents) = command_reply(&request, &peer) {
            let reply = Message::reply(request.request_id(), CursorId::NULL, 0, documents)?;
            conn.send(&reply)?;
        }
    }
}

fn main() -> zero_mongo::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:27117")?;
    println!("Server started on {}", listener.local_addr()?);

    for socket in listener.incoming() {
        let socket = socket?;
        socket.set_nodelay(true)?;
        println!("New connection received");
        let conn = Conn::new_with_stream(Stream::tcp(socket), Opts::default(), BsonCodec);
        thread::spawn(move || {
            match serve(conn) {
                Ok(()) => println!("Connection closed"),
                Err(e) => eprintln!("Connection error: {e}"),
            }
        });
    }
    Ok(())
}
