use crate::scan::CALL_OPCODE;

/// Generate a `len`-byte code-like buffer from a set of instructions
///
/// Instructions are read as couples `(i, j)`, cycling when exhausted:
/// - `i < 128`: a call whose target is `j/256` of the way into the buffer
/// - `i < 200`: a run of `(i - 128) % 16 + 1` filler bytes of value `j`
/// - otherwise: a call with an arbitrary, usually out-of-range displacement
pub fn call_heavy(instructions: &[u8], len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len + 16);
    if instructions.len() < 2 {
        out.resize(len, 0);
        return out;
    }

    for couple in instructions.chunks_exact(2).cycle() {
        if out.len() >= len {
            break;
        }
        let (i, j) = (couple[0], couple[1]);
        let pos = out.len() as i64;

        if i < 128 {
            let target = j as i64 * len as i64 / 256;
            out.push(CALL_OPCODE);
            out.extend_from_slice(&((target - pos) as i32).to_le_bytes());
        } else if i < 200 {
            let run = (i - 128) % 16 + 1;
            out.extend(std::iter::repeat_n(j, run as usize));
        } else {
            out.push(CALL_OPCODE);
            out.extend_from_slice(&[j, i, j, i]);
        }
    }
    out.truncate(len);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_length() {
        for len in [0, 1, 5, 11, 4096] {
            assert_eq!(call_heavy(&[1, 2, 130, 7], len).len(), len);
        }
        assert_eq!(call_heavy(&[], 12), vec![0; 12]);
    }

    #[test]
    fn emits_calls() {
        let buf = call_heavy(&[0, 128], 10);
        assert_eq!(buf[0], CALL_OPCODE);
        // target 128 * 10 / 256 = 5, from position 0
        assert_eq!(&buf[1..5], &[5, 0, 0, 0]);
        assert_eq!(buf[5], CALL_OPCODE);
    }
}
