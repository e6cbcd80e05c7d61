//! Example: Legacy opcode client
//!
//! Clears a collection, inserts four documents, queries them back, and kills
//! the cursor, checking `getLastError` after each write.
//!
//! Usage:
//!   MONGO_URL=mongodb://127.0.0.1:27017 cargo run --example client

#![allow(clippy::print_stdout)]

use std::env;

use bson::{Document, doc};
use zero_mongo::sync::Conn;
use zero_mongo::{BsonCodec, Message, OpCode};

fn print_reply(reply: &Message<Document>) {
    println!("  responseTo: {}", reply.response_to());
    if let Some(cursor) = reply.cursor_id("cursorID") {
        println!("  cursorID: {:?}", cursor.as_bytes());
    }
    for doc in reply.documents("documents").unwrap_or_default() {
        println!("  {doc}");
    }
}

fn get_last_error(conn: &mut Conn<BsonCodec>) -> zero_mongo::Result<()> {
    println!("Get last error...");
    let request = Message::builder(OpCode::Query)
        .request_id(conn.next_request_id())
        .cstring("fullCollectionName", "admin.$cmd")
        .int32("numberToSkip", 0)
        .int32("numberToReturn", -1)
        .document("query", doc! { "getLastError": 1 })
        .build()?;
    let reply = conn.call(&request)?;
    print_reply(&reply);
    Ok(())
}

fn main() -> zero_mongo::Result<()> {
    let url = env::var("MONGO_URL").unwrap_or_else(|_| "mongodb://127.0.0.1:27017".to_string());

    let mut conn = Conn::new(url.as_str(), BsonCodec)?;
    println!("Connected to {url}");

    println!("Truncate collection test.test...");
    conn.send(&Message::delete("test.test", Document::new())?)?;
    get_last_error(&mut conn)?;

    println!("Inserting test data");
    let documents = (1..=4)
        .map(|i| {
            doc! {
                "name": format!("document{i}"),
                "_id": i,
                "description": format!("test document {i} description"),
            }
        })
        .collect();
    let insert = Message::builder(OpCode::Insert)
        .request_id(conn.next_request_id())
        .flag("CONTINUE_ON_ERROR", true)
        .cstring("fullCollectionName", "test.test")
        .documents("documents", documents)
        .build()?;
    conn.send(&insert)?;
    get_last_error(&mut conn)?;

    println!("Querying test.test...");
    let query = Message::query(
        "test.test",
        0,
        100,
        doc! { "_id": { "$gte": 2 } },
        Some(doc! { "description": 1 }),
    )?;
    let reply = conn.call(&query)?;
    print_reply(&reply);

    if let Some(cursor) = reply.cursor_id("cursorID").filter(|c| !c.is_null()) {
        println!("Killing cursor {:?}", cursor.as_bytes());
        conn.send(&Message::kill_cursors(vec![cursor])?)?;
        get_last_error(&mut conn)?;
    }

    println!("Done");
    Ok(())
}
