//! Fixture encoding and event recording shared by the integration tests.

#![allow(dead_code)]

use std::ops::ControlFlow;

use gguf_reader::{
    DataLayout, ErrorKind, GGUFError, GGUFHeader, GGUFString, GGUFValue, GGUFValueType,
    PrimitiveValue, TensorInfo, TensorType, Visitor,
};

/// Little-endian byte builder for hand-made GGUF files.
#[derive(Default)]
pub struct Builder {
    buf: Vec<u8>,
}

impl Builder {
    pub fn header(tensor_count: u64, kv_count: u64) -> Self {
        Self::default()
            .raw(b"GGUF")
            .u32(3)
            .u64(tensor_count)
            .u64(kv_count)
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn u8(self, v: u8) -> Self {
        self.raw(&[v])
    }

    pub fn u32(self, v: u32) -> Self {
        self.raw(&v.to_le_bytes())
    }

    pub fn i32(self, v: i32) -> Self {
        self.raw(&v.to_le_bytes())
    }

    pub fn u64(self, v: u64) -> Self {
        self.raw(&v.to_le_bytes())
    }

    pub fn f32(self, v: f32) -> Self {
        self.raw(&v.to_le_bytes())
    }

    pub fn string(self, s: &str) -> Self {
        self.u64(s.len() as u64).raw(s.as_bytes())
    }

    /// Key plus value-type tag; the value follows.
    pub fn key(self, key: &str, value_type: u32) -> Self {
        self.string(key).u32(value_type)
    }

    pub fn array_header(self, element_type: u32, len: u64) -> Self {
        self.u32(element_type).u64(len)
    }

    pub fn tensor(self, name: &str, dims: &[u64], tensor_type: u32, offset: u64) -> Self {
        let mut b = self.string(name).u32(dims.len() as u32);
        for &d in dims {
            b = b.u64(d);
        }
        b.u32(tensor_type).u64(offset)
    }

    /// Zero-fill up to the next multiple of `align`.
    pub fn pad_to(mut self, align: usize) -> Self {
        let end = self.buf.len().next_multiple_of(align);
        self.buf.resize(end, 0);
        self
    }

    pub fn zeros(mut self, n: usize) -> Self {
        self.buf.resize(self.buf.len() + n, 0);
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

/// Owned copy of every event a traversal delivered.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Header(GGUFHeader),
    Key(String, GGUFValueType),
    Primitive(GGUFValue),
    ArrayStart(GGUFValueType, u64),
    ArrayElement(u64),
    ArrayEnd,
    Tensor(String, Vec<u64>, TensorType, u64),
    Done(DataLayout),
    Error(ErrorKind, Option<u64>),
}

#[derive(Default)]
pub struct Recorder {
    pub events: Vec<Event>,
    /// Also record `on_array_element`.
    pub with_elements: bool,
    /// Break out after this many recorded events.
    pub stop_after: Option<usize>,
}

impl Recorder {
    fn record(&mut self, event: Event) -> ControlFlow<()> {
        self.events.push(event);
        match self.stop_after {
            Some(n) if self.events.len() >= n => ControlFlow::Break(()),
            _ => ControlFlow::Continue(()),
        }
    }

    /// Events without the header/done/error framing.
    pub fn body(&self) -> Vec<Event> {
        self.events
            .iter()
            .filter(|e| !matches!(e, Event::Header(_) | Event::Done(_) | Event::Error(..)))
            .cloned()
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl<'a> Visitor<'a> for Recorder {
    fn on_header(&mut self, header: &GGUFHeader) -> ControlFlow<()> {
        self.record(Event::Header(*header))
    }

    fn on_key(&mut self, key: GGUFString<'a>, value_type: GGUFValueType) -> ControlFlow<()> {
        self.record(Event::Key(key.to_string_lossy().into_owned(), value_type))
    }

    fn on_primitive(&mut self, value: PrimitiveValue<'a>) -> ControlFlow<()> {
        self.record(Event::Primitive(value.to_owned_value()))
    }

    fn on_array_start(&mut self, element_type: GGUFValueType, len: u64) -> ControlFlow<()> {
        self.record(Event::ArrayStart(element_type, len))
    }

    fn on_array_element(&mut self, index: u64) -> ControlFlow<()> {
        if self.with_elements {
            self.record(Event::ArrayElement(index))
        } else {
            ControlFlow::Continue(())
        }
    }

    fn on_array_end(&mut self) -> ControlFlow<()> {
        self.record(Event::ArrayEnd)
    }

    fn on_tensor(&mut self, tensor: &TensorInfo<'a>) -> ControlFlow<()> {
        self.record(Event::Tensor(
            tensor.name.to_string_lossy().into_owned(),
            tensor.dims.clone(),
            tensor.tensor_type,
            tensor.offset,
        ))
    }

    fn on_done(&mut self, layout: &DataLayout) {
        self.events.push(Event::Done(*layout));
    }

    fn on_error(&mut self, error: &GGUFError) {
        self.events.push(Event::Error(error.kind(), error.offset()));
    }
}
