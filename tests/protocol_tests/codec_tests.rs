//! Codec Tests
//!
//! Tests for command encoding and reply decoding.

use bytes::Bytes;
use resplink::protocol::{
    decode_command, decode_reply, encode_command, encode_command_into, encoded_len, Command,
    DecodeLimits, RawReply, ReplyDecoder,
};
use resplink::RespError;

fn decode_one(bytes: &[u8]) -> resplink::Reply {
    let (reply, consumed) = decode_reply(bytes).unwrap().expect("complete reply");
    assert_eq!(consumed, bytes.len());
    reply
}

// =============================================================================
// Command Encoding Tests
// =============================================================================

#[test]
fn test_wire_format_set() {
    let cmd = Command::new("SET").arg("foo").arg("bar");
    let encoded = encode_command(&cmd);

    assert_eq!(encoded, b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n");
}

#[test]
fn test_wire_format_empty_argument() {
    let cmd = Command::new("SET").arg("key").arg("");
    let encoded = encode_command(&cmd);

    assert_eq!(encoded, b"*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$0\r\n\r\n");
}

#[test]
fn test_encoded_len_matches_output() {
    let cmd = Command::new("MSET")
        .arg("k1")
        .arg(vec![0u8; 1234])
        .arg("k2")
        .arg(42);
    assert_eq!(encoded_len(&cmd), encode_command(&cmd).len());
}

#[test]
fn test_encode_into_appends() {
    let mut buf = bytes::BytesMut::new();
    encode_command_into(&Command::new("PING"), &mut buf);
    encode_command_into(&Command::new("PING"), &mut buf);

    assert_eq!(&buf[..], b"*1\r\n$4\r\nPING\r\n*1\r\n$4\r\nPING\r\n");
}

// =============================================================================
// Round-trip Tests
// =============================================================================

#[test]
fn test_round_trip_binary_arguments() {
    // Arguments containing CRLF, NUL and high bytes
    let args: Vec<Vec<u8>> = vec![
        b"SET".to_vec(),
        vec![0x00, 0x01, 0xFF, 0xFE, 0x80],
        b"line\r\nbreak".to_vec(),
        (0..=255).collect(),
        Vec::new(),
    ];

    let cmd = Command::from_args(args.clone()).unwrap();
    let encoded = encode_command(&cmd);
    let (decoded, consumed) = decode_command(&encoded).unwrap().unwrap();

    assert_eq!(consumed, encoded.len());
    let decoded: Vec<Vec<u8>> = decoded.into_iter().map(|b| b.to_vec()).collect();
    assert_eq!(decoded, args);
}

#[test]
fn test_round_trip_many_arguments() {
    let args: Vec<String> = (0..1000).map(|i| format!("arg-{}", i)).collect();
    let cmd = Command::of("RPUSH", &args);
    let encoded = encode_command(&cmd);
    let (decoded, _) = decode_command(&encoded).unwrap().unwrap();

    assert_eq!(decoded.len(), 1001);
    assert_eq!(decoded[0], Bytes::from_static(b"RPUSH"));
    for (i, arg) in decoded[1..].iter().enumerate() {
        assert_eq!(arg, args[i].as_bytes());
    }
}

#[test]
fn test_decode_command_truncated() {
    let encoded = encode_command(&Command::new("GET").arg("somekey"));
    for cut in 0..encoded.len() {
        assert!(decode_command(&encoded[..cut]).unwrap().is_none(), "cut at {}", cut);
    }
}

#[test]
fn test_decode_command_huge_argc() {
    assert!(decode_command(b"*9223372036854775807\r\n").unwrap().is_none());
    assert!(decode_command(b"*9223372036854775807\r\n$1\r\na\r\n")
        .unwrap()
        .is_none());
}

#[test]
fn test_decode_command_rejects_inline() {
    let result = decode_command(b"PING\r\n");
    assert!(matches!(result, Err(RespError::Protocol(_))));
}

// =============================================================================
// Reply Decoding Tests
// =============================================================================

#[test]
fn test_decode_status() {
    let reply = decode_one(b"+OK\r\n");
    assert_eq!(reply.value(), RawReply::Status(b"OK"));
}

#[test]
fn test_decode_error() {
    let reply = decode_one(b"-ERR unknown command\r\n");
    assert_eq!(reply.value(), RawReply::Error(b"ERR unknown command"));
}

#[test]
fn test_decode_integers() {
    assert_eq!(decode_one(b":1000\r\n").value(), RawReply::Integer(1000));
    assert_eq!(decode_one(b":-42\r\n").value(), RawReply::Integer(-42));
    assert_eq!(decode_one(b":0\r\n").value(), RawReply::Integer(0));
    assert_eq!(
        decode_one(b":9223372036854775807\r\n").value(),
        RawReply::Integer(i64::MAX)
    );
}

#[test]
fn test_decode_bulk_string() {
    let reply = decode_one(b"$6\r\nfoobar\r\n");
    assert_eq!(reply.value(), RawReply::BulkString(Some(b"foobar")));
}

#[test]
fn test_decode_bulk_with_crlf_inside() {
    let reply = decode_one(b"$4\r\na\r\nb\r\n");
    assert_eq!(reply.as_bytes().unwrap(), b"a\r\nb");
}

#[test]
fn test_decode_nested_array() {
    let reply = decode_one(b"*2\r\n*3\r\n:1\r\n:2\r\n:3\r\n*2\r\n+Hello\r\n-World\r\n");
    let outer = reply.as_array().unwrap();
    assert_eq!(outer.len(), 2);

    let first = outer.get(0).unwrap().as_array().unwrap();
    let ints: Vec<i64> = first.iter().map(|e| e.as_integer().unwrap()).collect();
    assert_eq!(ints, vec![1, 2, 3]);

    let second = outer.get(1).unwrap().as_array().unwrap();
    assert_eq!(second.get(0).unwrap().as_status().unwrap(), "Hello");
    assert_eq!(second.get(1).unwrap().as_error().as_deref(), Some("World"));
}

#[test]
fn test_decode_consumes_exactly_one_unit() {
    let bytes = b":1\r\n:2\r\n";
    let (reply, consumed) = decode_reply(bytes).unwrap().unwrap();
    assert_eq!(consumed, 4);
    assert_eq!(reply.as_integer().unwrap(), 1);
}

#[test]
fn test_decode_truncated_returns_none() {
    let bytes = b"*2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n";
    for cut in 0..bytes.len() {
        assert!(decode_reply(&bytes[..cut]).unwrap().is_none(), "cut at {}", cut);
    }
    assert!(decode_reply(bytes).unwrap().is_some());
}

#[test]
fn test_decode_is_pure() {
    let bytes = b"*3\r\n$3\r\nfoo\r\n$-1\r\n*2\r\n:7\r\n+OK\r\n";
    let a = decode_one(bytes);
    let b = decode_one(bytes);
    assert_eq!(a, b);
}

// =============================================================================
// Malformed Input Tests
// =============================================================================

#[test]
fn test_unknown_type_byte() {
    let result = decode_reply(b"?what\r\n");
    assert!(result.unwrap_err().to_string().contains("Unknown reply type"));
}

#[test]
fn test_invalid_integer() {
    let result = decode_reply(b":12a\r\n");
    assert!(matches!(result, Err(RespError::Protocol(_))));
}

#[test]
fn test_invalid_length() {
    let result = decode_reply(b"$-5\r\n");
    assert!(matches!(result, Err(RespError::Protocol(_))));
}

#[test]
fn test_bulk_missing_terminator() {
    let result = decode_reply(b"$3\r\nfooXY");
    assert!(result.unwrap_err().to_string().contains("not terminated"));
}

#[test]
fn test_bulk_over_limit() {
    let mut decoder = ReplyDecoder::new(DecodeLimits {
        max_bulk_len: 8,
        max_depth: 4,
        ..DecodeLimits::default()
    });
    decoder.feed(b"$9\r\n");
    assert!(decoder.decode().unwrap_err().to_string().contains("too large"));
}

#[test]
fn test_depth_over_limit() {
    let mut decoder = ReplyDecoder::new(DecodeLimits {
        max_bulk_len: 1024,
        max_depth: 2,
        ..DecodeLimits::default()
    });
    decoder.feed(b"*1\r\n*1\r\n*1\r\n:1\r\n");
    assert!(decoder.decode().unwrap_err().to_string().contains("nesting"));
}

#[test]
fn test_huge_array_count_rejected() {
    let result = decode_reply(b"*9223372036854775807\r\n");
    assert!(result.unwrap_err().to_string().contains("Array too large"));

    let mut decoder = ReplyDecoder::new(DecodeLimits::default());
    decoder.feed(b"*9223372036854775807\r\n:1\r\n");
    assert!(matches!(decoder.decode(), Err(RespError::Protocol(_))));
}

#[test]
fn test_array_over_custom_limit() {
    let mut decoder = ReplyDecoder::new(DecodeLimits {
        max_array_len: 3,
        ..DecodeLimits::default()
    });
    decoder.feed(b"*3\r\n:1\r\n:2\r\n:3\r\n*4\r\n");

    let reply = decoder.decode().unwrap().unwrap();
    assert_eq!(reply.as_array().unwrap().len(), 3);
    assert!(decoder.decode().unwrap_err().to_string().contains("too large"));
}

#[test]
fn test_nested_array_over_custom_limit() {
    let mut decoder = ReplyDecoder::new(DecodeLimits {
        max_array_len: 2,
        ..DecodeLimits::default()
    });
    decoder.feed(b"*1\r\n*3\r\n");
    assert!(matches!(decoder.decode(), Err(RespError::Protocol(_))));
}

#[test]
fn test_limits_from_config() {
    let config = resplink::Config::builder().max_array_len(10).build();
    let limits = DecodeLimits::from(&config);
    assert_eq!(limits.max_array_len, 10);
    assert_eq!(
        DecodeLimits::default().max_array_len,
        resplink::protocol::DEFAULT_MAX_ARRAY_LEN
    );
}

// =============================================================================
// Incremental Decoder Tests
// =============================================================================

#[test]
fn test_decoder_byte_by_byte() {
    let bytes = b"*2\r\n$5\r\nhello\r\n$5\r\nworld\r\n";
    let mut decoder = ReplyDecoder::new(DecodeLimits::default());

    for (i, byte) in bytes.iter().enumerate() {
        decoder.feed(&[*byte]);
        let result = decoder.decode().unwrap();
        if i + 1 < bytes.len() {
            assert!(result.is_none(), "complete too early at byte {}", i);
        } else {
            let reply = result.unwrap();
            assert_eq!(reply.as_string_array().unwrap(), vec!["hello", "world"]);
        }
    }
    assert_eq!(decoder.buffered(), 0);
}

#[test]
fn test_decoder_multiple_replies_in_one_feed() {
    let mut decoder = ReplyDecoder::new(DecodeLimits::default());
    decoder.feed(b"+OK\r\n:5\r\n$-1\r\n$2\r\nhi");

    assert_eq!(decoder.decode().unwrap().unwrap().as_status().unwrap(), "OK");
    assert_eq!(decoder.decode().unwrap().unwrap().as_integer().unwrap(), 5);
    assert!(decoder.decode().unwrap().unwrap().is_nil());
    assert!(decoder.decode().unwrap().is_none());

    decoder.feed(b"\r\n");
    assert_eq!(decoder.decode().unwrap().unwrap().as_string().unwrap(), "hi");
}

#[test]
fn test_decoder_large_bulk_in_chunks() {
    let payload = vec![b'z'; 100_000];
    let mut bytes = format!("${}\r\n", payload.len()).into_bytes();
    bytes.extend_from_slice(&payload);
    bytes.extend_from_slice(b"\r\n");

    let mut decoder = ReplyDecoder::new(DecodeLimits::default());
    let mut replies = Vec::new();
    for chunk in bytes.chunks(4096) {
        decoder.feed(chunk);
        if let Some(reply) = decoder.decode().unwrap() {
            replies.push(reply);
        }
    }

    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].as_bytes().unwrap(), &payload[..]);
}

#[test]
fn test_decoder_large_array_in_chunks_resumes() {
    let count = 10_000;
    let mut bytes = format!("*{}\r\n", count).into_bytes();
    for i in 0..count {
        bytes.extend_from_slice(format!(":{}\r\n", i).as_bytes());
    }

    let mut decoder = ReplyDecoder::new(DecodeLimits::default());
    let mut reply = None;
    let mut last_parsed = 0;
    for chunk in bytes.chunks(5) {
        decoder.feed(chunk);
        match decoder.decode().unwrap() {
            Some(r) => reply = Some(r),
            None => {
                // Only the trailing partial line is left to look at
                assert!(decoder.parsed() >= last_parsed);
                assert!(decoder.buffered() - decoder.parsed() < ":9999\r\n".len() + 1);
                last_parsed = decoder.parsed();
            }
        }
    }

    let reply = reply.expect("complete reply");
    let elements = reply.as_array().unwrap();
    assert_eq!(elements.len(), count);
    assert_eq!(elements.get(0).unwrap().as_integer().unwrap(), 0);
    assert_eq!(elements.get(count - 1).unwrap().as_integer().unwrap(), 9999);
    assert_eq!(decoder.buffered(), 0);
    assert_eq!(decoder.parsed(), 0);
}

#[test]
fn test_decoder_nested_arrays_across_feeds() {
    let mut decoder = ReplyDecoder::new(DecodeLimits::default());
    decoder.feed(b"*2\r\n*2\r\n$1\r\na");
    assert!(decoder.decode().unwrap().is_none());
    decoder.feed(b"\r\n*0\r\n*1\r\n");
    assert!(decoder.decode().unwrap().is_none());
    decoder.feed(b":7\r\n+tail\r\n");

    let reply = decoder.decode().unwrap().unwrap();
    let outer = reply.as_array().unwrap();
    assert_eq!(outer.len(), 2);
    let first = outer.get(0).unwrap().as_array().unwrap();
    assert_eq!(first.get(0).unwrap().as_string().unwrap(), "a");
    assert!(first.get(1).unwrap().as_array().unwrap().is_empty());
    let second = outer.get(1).unwrap().as_array().unwrap();
    assert_eq!(second.get(0).unwrap().as_integer().unwrap(), 7);

    assert_eq!(decoder.decode().unwrap().unwrap().as_status().unwrap(), "tail");
}

#[test]
fn test_decoder_recovers_after_clear() {
    let mut decoder = ReplyDecoder::new(DecodeLimits::default());
    decoder.feed(b"*3\r\n:1\r\n");
    assert!(decoder.decode().unwrap().is_none());
    assert!(decoder.parsed() > 0);

    decoder.clear();
    assert_eq!(decoder.parsed(), 0);
    decoder.feed(b":2\r\n");
    assert_eq!(decoder.decode().unwrap().unwrap().as_integer().unwrap(), 2);
}

#[test]
fn test_reply_owns_only_its_unit() {
    let mut decoder = ReplyDecoder::new(DecodeLimits::default());
    decoder.feed(b"$3\r\nabc\r\n:1\r\n");

    let reply = decoder.decode().unwrap().unwrap();
    assert_eq!(&reply.wire_bytes()[..], b"$3\r\nabc\r\n");
    assert_eq!(decoder.buffered(), 4);
}
