//! Named bits of the Int32 `flags` field.

use super::types::OpCode;

/// A named bit of a flags word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagSpec {
    /// Flag name
    pub name: &'static str,
    /// Bit mask
    pub mask: i32,
}

const fn flag(name: &'static str, mask: i32) -> FlagSpec {
    FlagSpec { name, mask }
}

const REPLY: &[FlagSpec] = &[
    flag("CURSOR_NOT_FOUND", 1),
    flag("QUERY_FAILURE", 2),
    flag("SHARD_CONFIG_STALE", 4),
    flag("AWAIT_CAPABLE", 8),
];

const QUERY: &[FlagSpec] = &[
    flag("TAILABLE_CURSOR", 2),
    flag("SLAVE", 4),
    flag("OPLOG_REPLAY", 8),
    flag("NO_CURSOR_TIMEOUT", 16),
    flag("AWAIT_DATA", 32),
    flag("EXHAUST", 64),
    flag("PARTIAL", 128),
];

const UPDATE: &[FlagSpec] = &[flag("UPSERT", 1), flag("MULTI_UPDATE", 2)];

const INSERT: &[FlagSpec] = &[flag("CONTINUE_ON_ERROR", 1)];

const DELETE: &[FlagSpec] = &[flag("SINGLE_REMOVE", 1)];

/// Flag table for an opcode; empty for opcodes without a flags field.
pub fn flags_for(op_code: OpCode) -> &'static [FlagSpec] {
    match op_code {
        OpCode::Reply => REPLY,
        OpCode::Query => QUERY,
        OpCode::Update => UPDATE,
        OpCode::Insert => INSERT,
        OpCode::Delete => DELETE,
        OpCode::Msg
        | OpCode::Reserved
        | OpCode::GetMore
        | OpCode::KillCursors
        | OpCode::Command
        | OpCode::CommandReply => &[],
    }
}

/// Look up a flag by name.
pub fn flag_spec(op_code: OpCode, name: &str) -> Option<&'static FlagSpec> {
    flags_for(op_code).iter().find(|f| f.name == name)
}

/// Split a raw flags word into named booleans, one entry per named bit.
pub fn decode_flags(op_code: OpCode, raw: i32) -> Vec<(&'static str, bool)> {
    flags_for(op_code)
        .iter()
        .map(|f| (f.name, (raw & f.mask) != 0))
        .collect()
}

/// Combine named booleans into a flags word.
///
/// Names set to `false` and names not in the opcode's table contribute nothing.
pub fn encode_flags<'a, I>(op_code: OpCode, named: I) -> i32
where
    I: IntoIterator<Item = (&'a str, bool)>,
{
    named
        .into_iter()
        .filter(|(_, on)| *on)
        .filter_map(|(name, _)| flag_spec(op_code, name))
        .fold(0, |acc, f| acc | f.mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLAGGED: [OpCode; 5] = [
        OpCode::Reply,
        OpCode::Query,
        OpCode::Update,
        OpCode::Insert,
        OpCode::Delete,
    ];

    #[test]
    fn test_masked_and() {
        // 0b110: TAILABLE_CURSOR | SLAVE
        let flags = decode_flags(OpCode::Query, 6);
        let on: Vec<_> = flags.iter().filter(|(_, b)| *b).map(|(n, _)| *n).collect();
        assert_eq!(on, ["TAILABLE_CURSOR", "SLAVE"]);
        assert_eq!(flags.len(), 7);
    }

    #[test]
    fn test_every_subset_round_trips() {
        for op in FLAGGED {
            let table = flags_for(op);
            for subset in 0u32..(1 << table.len()) {
                let named: Vec<_> = table
                    .iter()
                    .enumerate()
                    .map(|(i, f)| (f.name, (subset & (1 << i)) != 0))
                    .collect();
                let raw = encode_flags(op, named.iter().copied());
                assert_eq!(decode_flags(op, raw), named, "{op} subset {subset:#b}");
            }
        }
    }

    #[test]
    fn test_unknown_names_ignored() {
        assert_eq!(
            encode_flags(OpCode::Delete, [("UPSERT", true), ("SINGLE_REMOVE", false)]),
            0
        );
        assert_eq!(encode_flags(OpCode::Update, [("UPSERT", true)]), 1);
    }

    #[test]
    fn test_no_table() {
        assert!(decode_flags(OpCode::GetMore, -1).is_empty());
        assert_eq!(encode_flags(OpCode::Msg, [("EXHAUST", true)]), 0);
    }
}
