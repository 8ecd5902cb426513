use crate::{share::BufReader, ProbeErr};

const SEGMENT_BITS: u32 = 0x7F;
const CHECKER_BIT: u8 = 0x80;
const MAX_VARINT_LEN: usize = 5;

/// Encode the given number as a [VarInt](https://wiki.vg/Protocol#VarInt_and_VarLong).
pub fn encode_varint(num: i32) -> Vec<u8> {
    // Negative values always use the maximum number of bytes, which is what
    // encoding the two's complement bits as unsigned gives us.
    let mut num = num as u32;
    let mut result = Vec::<u8>::new();

    loop {
        if (num & (!SEGMENT_BITS)) == 0 {
            result.push(num as u8);

            return result;
        }

        result.push(((num & SEGMENT_BITS) | (!SEGMENT_BITS)) as u8);
        num >>= 7;
    }
}

/// Decode the given VarInt as a number.
pub fn decode_varint(arr: &[u8]) -> Result<i32, ProbeErr> {
    if arr.len() > MAX_VARINT_LEN {
        return Err(ProbeErr::DataErr(format!(
            "VarInts are never longer than 5 bytes, but got {}",
            arr.len()
        )));
    }

    match arr.last() {
        Some(&n) => {
            if n & CHECKER_BIT != 0 {
                return Err(ProbeErr::DataErr(format!(
                    "Invalid VarInt data: [{}]",
                    arr.iter()
                        .map(|&x| x.to_string())
                        .collect::<Vec<String>>()
                        .join(", ")
                )));
            }

            let mut result = 0u32;

            for (i, &n) in arr.iter().enumerate() {
                result |= ((n as u32) & SEGMENT_BITS) << (i * 7);
            }

            Ok(result as i32)
        }
        None => Err(ProbeErr::DataErr("VarInt is empty".into())),
    }
}

/// Read one VarInt from `reader`, advancing past it.
pub fn read_varint(reader: &mut BufReader) -> Result<i32, ProbeErr> {
    let mut buffer = Vec::<u8>::with_capacity(MAX_VARINT_LEN);

    loop {
        let buf = reader.read()?;

        buffer.push(buf);

        if buf & CHECKER_BIT == 0 || buffer.len() > MAX_VARINT_LEN {
            break;
        }
    }

    decode_varint(&buffer)
}
