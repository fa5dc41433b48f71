//! The event interface a consumer implements to observe a traversal.
//!
//! Events arrive in file order: the header, then each metadata entry
//! (`on_key` followed by the events of its value), then each tensor
//! descriptor, then `on_done`. Within an array, `on_array_start` precedes
//! the element events and `on_array_end` follows them.
//!
//! Returning [`ControlFlow::Break`] from any callback stops the traversal;
//! the reader then returns [`GGUFError::Aborted`](crate::GGUFError::Aborted)
//! and delivers nothing further.

use std::ops::ControlFlow;

use crate::error::GGUFError;
use crate::types::{DataLayout, GGUFHeader, GGUFString, GGUFValueType, PrimitiveValue, TensorInfo};

/// Callbacks for a GGUF traversal. Every method defaults to doing nothing,
/// so implementors only override what they need.
///
/// `'a` is the lifetime of the byte source: borrowed strings handed to the
/// callbacks stay valid for as long as the source does.
pub trait Visitor<'a> {
    fn on_header(&mut self, _header: &GGUFHeader) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn on_key(&mut self, _key: GGUFString<'a>, _value_type: GGUFValueType) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn on_primitive(&mut self, _value: PrimitiveValue<'a>) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn on_array_start(&mut self, _element_type: GGUFValueType, _len: u64) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    /// Emitted before the `index`-th element of the innermost open array.
    fn on_array_element(&mut self, _index: u64) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn on_array_end(&mut self) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn on_tensor(&mut self, _tensor: &TensorInfo<'a>) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn on_done(&mut self, _layout: &DataLayout) {}

    /// Called once with the error that ended the traversal. Not called for
    /// aborts requested by the visitor itself.
    fn on_error(&mut self, _error: &GGUFError) {}
}

/// Validate-only traversal.
impl Visitor<'_> for () {}

impl<'a, V: Visitor<'a> + ?Sized> Visitor<'a> for &mut V {
    fn on_header(&mut self, header: &GGUFHeader) -> ControlFlow<()> {
        (**self).on_header(header)
    }

    fn on_key(&mut self, key: GGUFString<'a>, value_type: GGUFValueType) -> ControlFlow<()> {
        (**self).on_key(key, value_type)
    }

    fn on_primitive(&mut self, value: PrimitiveValue<'a>) -> ControlFlow<()> {
        (**self).on_primitive(value)
    }

    fn on_array_start(&mut self, element_type: GGUFValueType, len: u64) -> ControlFlow<()> {
        (**self).on_array_start(element_type, len)
    }

    fn on_array_element(&mut self, index: u64) -> ControlFlow<()> {
        (**self).on_array_element(index)
    }

    fn on_array_end(&mut self) -> ControlFlow<()> {
        (**self).on_array_end()
    }

    fn on_tensor(&mut self, tensor: &TensorInfo<'a>) -> ControlFlow<()> {
        (**self).on_tensor(tensor)
    }

    fn on_done(&mut self, layout: &DataLayout) {
        (**self).on_done(layout)
    }

    fn on_error(&mut self, error: &GGUFError) {
        (**self).on_error(error)
    }
}
