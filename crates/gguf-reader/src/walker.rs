//! Recursive typed-value traversal.
//!
//! A value is either a leaf, reported through `on_primitive`, or an array,
//! reported as `on_array_start`, one `on_array_element` plus the element's
//! own events per element, then `on_array_end`. Nested arrays recurse.

use std::ops::ControlFlow;

use tracing::trace;

use crate::decode::Decoder;
use crate::error::{GGUFError, Result};
use crate::source::ByteSource;
use crate::types::GGUFValueType;
use crate::visitor::Visitor;

/// Turn a visitor's answer into a traversal result.
pub(crate) fn proceed(flow: ControlFlow<()>, offset: u64) -> Result<()> {
    match flow {
        ControlFlow::Continue(()) => Ok(()),
        ControlFlow::Break(()) => Err(GGUFError::Aborted { offset }),
    }
}

pub struct ValueWalker<'s, S: ?Sized> {
    decoder: Decoder<'s, S>,
    max_depth: usize,
}

impl<'s, S: ByteSource + ?Sized> ValueWalker<'s, S> {
    /// `max_depth` is the number of array levels a value may nest.
    pub fn new(decoder: Decoder<'s, S>, max_depth: usize) -> Self {
        Self { decoder, max_depth }
    }

    /// Walk one value of `value_type` at `offset`, returning the offset
    /// just past it.
    pub fn walk<V: Visitor<'s> + ?Sized>(
        &self,
        offset: u64,
        value_type: GGUFValueType,
        visitor: &mut V,
    ) -> Result<u64> {
        self.walk_at_depth(offset, value_type, visitor, 0)
    }

    fn walk_at_depth<V: Visitor<'s> + ?Sized>(
        &self,
        offset: u64,
        value_type: GGUFValueType,
        visitor: &mut V,
        depth: usize,
    ) -> Result<u64> {
        if value_type != GGUFValueType::Array {
            let (value, consumed) = self.decoder.decode_primitive(offset, value_type)?;
            let next = offset + consumed;
            proceed(visitor.on_primitive(value), next)?;
            return Ok(next);
        }

        if depth >= self.max_depth {
            return Err(GGUFError::DepthExceeded {
                max: self.max_depth,
                offset,
            });
        }

        let element_type = self.decoder.read_value_type(offset)?;
        let len = self.decoder.read_u64(offset + 4)?;
        let mut pos = offset + 12;

        // Reject counts the remaining bytes cannot possibly hold before
        // looping over them.
        let remaining = self.decoder.remaining(pos);
        match len.checked_mul(element_type.min_encoded_size()) {
            Some(needed) if needed <= remaining => {}
            needed => {
                return Err(GGUFError::Truncated {
                    offset: pos,
                    needed: needed.unwrap_or(u64::MAX),
                });
            }
        }

        trace!(%element_type, len, depth, offset, "array");
        proceed(visitor.on_array_start(element_type, len), pos)?;
        for index in 0..len {
            proceed(visitor.on_array_element(index), pos)?;
            pos = self.walk_at_depth(pos, element_type, visitor, depth + 1)?;
        }
        proceed(visitor.on_array_end(), pos)?;
        Ok(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::PrimitiveValue;

    #[derive(Default)]
    struct Log(Vec<String>);

    impl<'a> Visitor<'a> for Log {
        fn on_primitive(&mut self, value: PrimitiveValue<'a>) -> ControlFlow<()> {
            self.0.push(format!("{value:?}"));
            ControlFlow::Continue(())
        }

        fn on_array_start(&mut self, element_type: GGUFValueType, len: u64) -> ControlFlow<()> {
            self.0.push(format!("[{element_type};{len}"));
            ControlFlow::Continue(())
        }

        fn on_array_end(&mut self) -> ControlFlow<()> {
            self.0.push("]".into());
            ControlFlow::Continue(())
        }
    }

    fn array_header(element: u32, len: u64) -> Vec<u8> {
        let mut out = element.to_le_bytes().to_vec();
        out.extend_from_slice(&len.to_le_bytes());
        out
    }

    #[test]
    fn walks_nested_arrays() {
        let mut bytes = array_header(9, 2);
        for pair in [[1u32, 2], [3, 4]] {
            bytes.extend(array_header(4, 2));
            for v in pair {
                bytes.extend_from_slice(&v.to_le_bytes());
            }
        }
        let walker = ValueWalker::new(Decoder::new(bytes.as_slice()), 64);
        let mut log = Log::default();
        let end = walker.walk(0, GGUFValueType::Array, &mut log).unwrap();
        assert_eq!(end, bytes.len() as u64);
        assert_eq!(
            log.0,
            [
                "[array;2", "[uint32;2", "Uint32(1)", "Uint32(2)", "]", "[uint32;2", "Uint32(3)",
                "Uint32(4)", "]", "]"
            ]
        );
    }

    #[test]
    fn empty_array_brackets_with_no_elements() {
        let bytes = array_header(8, 0);
        let walker = ValueWalker::new(Decoder::new(bytes.as_slice()), 64);
        let mut log = Log::default();
        walker.walk(0, GGUFValueType::Array, &mut log).unwrap();
        assert_eq!(log.0, ["[string;0", "]"]);
    }

    #[test]
    fn synthetic_element_tags_are_invalid() {
        for tag in [100u32, 101, 13] {
            let bytes = array_header(tag, 0);
            let walker = ValueWalker::new(Decoder::new(bytes.as_slice()), 64);
            let err = walker.walk(0, GGUFValueType::Array, &mut ()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidValueType);
            assert_eq!(err.offset(), Some(0));
        }
    }

    #[test]
    fn hostile_count_fails_before_any_event() {
        let mut bytes = array_header(6, u64::MAX / 2);
        bytes.extend_from_slice(&1f32.to_le_bytes());
        let walker = ValueWalker::new(Decoder::new(bytes.as_slice()), 64);
        let mut log = Log::default();
        let err = walker.walk(0, GGUFValueType::Array, &mut log).unwrap_err();
        assert!(matches!(err, GGUFError::Truncated { offset: 12, .. }));
        assert!(log.0.is_empty());
    }

    #[test]
    fn sixteen_levels_are_accepted_and_the_cap_enforced() {
        let mut bytes = Vec::new();
        for _ in 0..15 {
            bytes.extend(array_header(9, 1));
        }
        bytes.extend(array_header(0, 1));
        bytes.push(42);

        let walker = ValueWalker::new(Decoder::new(bytes.as_slice()), 16);
        let mut log = Log::default();
        walker.walk(0, GGUFValueType::Array, &mut log).unwrap();
        assert_eq!(log.0.iter().filter(|e| e.starts_with('[')).count(), 16);
        assert!(log.0.contains(&"Uint8(42)".to_string()));

        let shallow = ValueWalker::new(Decoder::new(bytes.as_slice()), 15);
        let err = shallow.walk(0, GGUFValueType::Array, &mut ()).unwrap_err();
        assert!(matches!(err, GGUFError::DepthExceeded { max: 15, offset: 180 }));
    }

    #[test]
    fn break_aborts_the_walk() {
        struct StopAtSecond(u32);
        impl<'a> Visitor<'a> for StopAtSecond {
            fn on_primitive(&mut self, _value: PrimitiveValue<'a>) -> ControlFlow<()> {
                self.0 += 1;
                if self.0 == 2 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            }
        }

        let mut bytes = array_header(0, 3);
        bytes.extend_from_slice(&[1, 2, 3]);
        let walker = ValueWalker::new(Decoder::new(bytes.as_slice()), 64);
        let mut stop = StopAtSecond(0);
        let err = walker.walk(0, GGUFValueType::Array, &mut stop).unwrap_err();
        assert!(matches!(err, GGUFError::Aborted { offset: 14 }));
        assert_eq!(stop.0, 2);
    }
}
