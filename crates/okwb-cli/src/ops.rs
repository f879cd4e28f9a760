//! Command-line operation syntax.
//!
//! ```text
//! reset                 pulse the gateware reset
//! r:<addr>              single read
//! w:<addr>=<value>      single write
//! br:<addr>x<count>     burst read
//! bw:<addr>=<w0>,<w1>   burst write
//! debug                 read the debug wire
//! irq                   test the interrupt flag
//! ```
//!
//! Numbers are decimal or `0x` hex. Burst words may be negative.

use anyhow::{anyhow, bail, Context, Result};
use okwb_driver::Transaction;
use std::str::FromStr;

/// One step of an `exec` run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// A bus transaction
    Bus(Transaction),
    /// Read the debug wire-out
    Debug,
    /// Test the interrupt trigger-out
    Irq,
}

impl FromStr for Op {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s {
            "reset" => return Ok(Self::Bus(Transaction::Reset)),
            "debug" => return Ok(Self::Debug),
            "irq" => return Ok(Self::Irq),
            _ => {}
        }

        let (kind, args) = s
            .split_once(':')
            .ok_or_else(|| anyhow!("unrecognised op `{s}`"))?;

        let tx = match kind {
            "r" => Transaction::SingleRead {
                addr: parse_u32(args)?,
            },
            "w" => {
                let (addr, value) = split_pair(args, '=', s)?;
                Transaction::SingleWrite {
                    addr: parse_u32(addr)?,
                    value: parse_u32(value)?,
                }
            }
            "br" => {
                let (addr, count) = split_count(args, s)?;
                Transaction::BurstRead {
                    addr: parse_u32(addr)?,
                    count: count
                        .parse()
                        .with_context(|| format!("bad word count `{count}`"))?,
                }
            }
            "bw" => {
                let (addr, words) = split_pair(args, '=', s)?;
                let words = if words.is_empty() {
                    Vec::new()
                } else {
                    words.split(',').map(parse_word).collect::<Result<_>>()?
                };
                Transaction::BurstWrite {
                    addr: parse_u32(addr)?,
                    words,
                }
            }
            _ => bail!("unrecognised op `{s}`"),
        };
        Ok(Self::Bus(tx))
    }
}

fn split_pair<'a>(args: &'a str, sep: char, op: &str) -> Result<(&'a str, &'a str)> {
    args.rsplit_once(sep)
        .ok_or_else(|| anyhow!("op `{op}` is missing `{sep}`"))
}

/// Split `<addr>x<count>` on the first `x` past any `0x` prefix.
fn split_count<'a>(args: &'a str, op: &str) -> Result<(&'a str, &'a str)> {
    let args = args.trim_start();
    let skip = if args.starts_with("0x") || args.starts_with("0X") {
        2
    } else {
        0
    };
    let at = args[skip..]
        .find('x')
        .ok_or_else(|| anyhow!("op `{op}` is missing a word count"))?;
    let (addr, rest) = args.split_at(skip + at);
    Ok((addr, &rest[1..]))
}

/// Parse a decimal or `0x` hex unsigned number.
pub fn parse_u32(s: &str) -> Result<u32> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.with_context(|| format!("bad number `{s}`"))
}

/// Parse a bus word: signed decimal, or `0x` hex taken as the raw 16 bits.
#[allow(clippy::cast_possible_wrap)]
pub fn parse_word(s: &str) -> Result<i16> {
    let s = s.trim();
    if s.starts_with("0x") || s.starts_with("0X") {
        let raw = parse_u32(s)?;
        let raw = u16::try_from(raw).with_context(|| format!("word `{s}` exceeds 16 bits"))?;
        Ok(raw as i16)
    } else {
        s.parse().with_context(|| format!("bad word `{s}`"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_op() {
        assert_eq!("reset".parse::<Op>().unwrap(), Op::Bus(Transaction::Reset));
        assert_eq!("debug".parse::<Op>().unwrap(), Op::Debug);
        assert_eq!("irq".parse::<Op>().unwrap(), Op::Irq);
        assert_eq!(
            "r:0x10".parse::<Op>().unwrap(),
            Op::Bus(Transaction::SingleRead { addr: 0x10 })
        );
        assert_eq!(
            "w:5=0x00FF".parse::<Op>().unwrap(),
            Op::Bus(Transaction::SingleWrite {
                addr: 5,
                value: 0xFF
            })
        );
        assert_eq!(
            "br:16x4".parse::<Op>().unwrap(),
            Op::Bus(Transaction::BurstRead { addr: 16, count: 4 })
        );
        assert_eq!(
            "br:0x10x4".parse::<Op>().unwrap(),
            Op::Bus(Transaction::BurstRead { addr: 16, count: 4 })
        );
        assert_eq!(
            "bw:16=0,-1,0x8000".parse::<Op>().unwrap(),
            Op::Bus(Transaction::BurstWrite {
                addr: 16,
                words: vec![0, -1, i16::MIN]
            })
        );
    }

    #[test]
    fn empty_burst_write_is_allowed() {
        assert_eq!(
            "bw:0=".parse::<Op>().unwrap(),
            Op::Bus(Transaction::BurstWrite {
                addr: 0,
                words: Vec::new()
            })
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!("frobnicate".parse::<Op>().is_err());
        assert!("w:5".parse::<Op>().is_err());
        assert!("br:5x-1".parse::<Op>().is_err());
        assert!("br:0x10".parse::<Op>().is_err());
        assert!("br:0x10x".parse::<Op>().is_err());
        assert!("br:16".parse::<Op>().is_err());
        assert!("bw:0=0x10000".parse::<Op>().is_err());
        assert!("r:zz".parse::<Op>().is_err());
    }
}
