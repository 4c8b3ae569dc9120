//! Packed, aligned layout for arrays of per-object structs
//!
//! Fields are laid out in declaration order. Each field starts at the running
//! cursor rounded up to its alignment, and the struct stride is the final
//! cursor rounded up to 16 bytes, which is the array-element rule of packed
//! structured GPU buffers. The layout depends only on the field list, so two
//! arrays built from equal field lists are byte-for-byte compatible.

use crate::render::material::{MaterialParameter, ParameterKind};

/// Stride granularity of struct array elements
pub const STRUCT_ALIGNMENT: usize = 16;

/// Round `value` up to a multiple of `alignment` (treated as at least 1)
pub const fn align_up(value: usize, alignment: usize) -> usize {
    let alignment = if alignment == 0 { 1 } else { alignment };
    value.div_ceil(alignment) * alignment
}

/// Field declaration: name, byte size and required alignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    /// Field name
    pub name: String,
    /// Size in bytes
    pub size: usize,
    /// Required alignment in bytes
    pub alignment: usize,
}

impl FieldDecl {
    /// Declare a field
    pub fn new(name: impl Into<String>, size: usize, alignment: usize) -> Self {
        Self {
            name: name.into(),
            size,
            alignment: alignment.max(1),
        }
    }

    /// Declaration for a non-texture material parameter
    ///
    /// Scalars and booleans take 4 bytes at 4-byte alignment, 4-vectors take
    /// 16 bytes at 16-byte alignment. Texture parameters have no struct field.
    pub fn for_parameter(name: &str, kind: ParameterKind) -> Option<Self> {
        match kind {
            ParameterKind::Float | ParameterKind::Bool => Some(Self::new(name, 4, 4)),
            ParameterKind::Vec4 => Some(Self::new(name, 16, 16)),
            ParameterKind::Texture(_) => None,
        }
    }
}

/// A laid-out field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructField {
    /// Field name
    pub name: String,
    /// Size in bytes
    pub size: usize,
    /// Alignment in bytes
    pub alignment: usize,
    /// Byte offset inside one struct
    pub offset: usize,
    /// Padding inserted before this field
    pub padding_before: usize,
}

/// Computed layout of one struct
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StructLayout {
    fields: Vec<StructField>,
    stride: usize,
}

impl StructLayout {
    /// Lay out fields in declaration order
    pub fn new(decls: impl IntoIterator<Item = FieldDecl>) -> Self {
        let mut cursor = 0;
        let fields: Vec<StructField> = decls
            .into_iter()
            .map(|decl| {
                let offset = align_up(cursor, decl.alignment);
                let field = StructField {
                    padding_before: offset - cursor,
                    offset,
                    name: decl.name,
                    size: decl.size,
                    alignment: decl.alignment,
                };
                cursor = offset + decl.size;
                field
            })
            .collect();

        Self {
            fields,
            stride: align_up(cursor, STRUCT_ALIGNMENT),
        }
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[StructField] {
        &self.fields
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&StructField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Bytes per struct, a multiple of 16
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Whether the layout has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A value written into a struct field
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    /// 32-bit float
    Float(f32),
    /// 32-bit signed integer
    Int(i32),
    /// 32-bit unsigned integer
    UInt(u32),
    /// Boolean, stored as a 32-bit 0/1
    Bool(bool),
    /// Four 32-bit floats
    Vec4([f32; 4]),
    /// Four 32-bit signed integers
    IVec4([i32; 4]),
}

impl FieldValue {
    /// Size of the encoded value
    pub const fn size(&self) -> usize {
        match self {
            Self::Float(_) | Self::Int(_) | Self::UInt(_) | Self::Bool(_) => 4,
            Self::Vec4(_) | Self::IVec4(_) => 16,
        }
    }

    fn encode(&self, out: &mut [u8]) {
        match self {
            Self::Float(v) => out.copy_from_slice(&v.to_ne_bytes()),
            Self::Int(v) => out.copy_from_slice(&v.to_ne_bytes()),
            Self::UInt(v) => out.copy_from_slice(&v.to_ne_bytes()),
            Self::Bool(v) => out.copy_from_slice(&u32::from(*v).to_ne_bytes()),
            Self::Vec4(v) => out.copy_from_slice(bytemuck::cast_slice(v)),
            Self::IVec4(v) => out.copy_from_slice(bytemuck::cast_slice(v)),
        }
    }

    /// Struct value of a material parameter; textures have none
    pub const fn from_parameter(value: &MaterialParameter) -> Option<Self> {
        match value {
            MaterialParameter::Float(v) => Some(Self::Float(*v)),
            MaterialParameter::Bool(v) => Some(Self::Bool(*v)),
            MaterialParameter::Vec4(v) => Some(Self::Vec4(*v)),
            MaterialParameter::Texture(_) => None,
        }
    }
}

/// Zero-initialized byte array of `count` structs sharing one layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructArray {
    layout: StructLayout,
    count: usize,
    data: Vec<u8>,
}

impl StructArray {
    /// Allocate `count` zeroed structs
    pub fn new(layout: StructLayout, count: usize) -> Self {
        let data = vec![0; layout.stride() * count];
        Self { layout, count, data }
    }

    /// Write a field of struct `index`
    ///
    /// Unknown names, out-of-range indices and size mismatches are logged and
    /// ignored; the return value says whether anything was written.
    pub fn set(&mut self, index: usize, name: &str, value: FieldValue) -> bool {
        let Some(field) = self.layout.field(name) else {
            log::warn!("Struct field '{}' not found, write ignored", name);
            return false;
        };

        if index >= self.count {
            log::warn!("Struct index {} out of range ({} elements)", index, self.count);
            return false;
        }

        if value.size() != field.size {
            log::warn!(
                "Struct field '{}' is {} bytes, value is {} bytes; write ignored",
                name,
                field.size,
                value.size()
            );
            return false;
        }

        let start = index * self.layout.stride() + field.offset;
        value.encode(&mut self.data[start..start + field.size]);
        true
    }

    /// Layout shared by every element
    pub fn layout(&self) -> &StructLayout {
        &self.layout
    }

    /// Number of elements
    pub fn count(&self) -> usize {
        self.count
    }

    /// Bytes per element
    pub fn stride(&self) -> usize {
        self.layout.stride()
    }

    /// Raw bytes, `stride * count` long
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Bytes of one element
    pub fn element(&self, index: usize) -> Option<&[u8]> {
        if index >= self.count {
            return None;
        }
        let stride = self.layout.stride();
        let start = index * stride;
        self.data.get(start..start + stride)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Small deterministic generator so the layout properties cover many lists
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self) -> usize {
            self.0 = self.0.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
            (self.0 >> 33) as usize
        }
    }

    fn random_fields(rng: &mut Lcg) -> Vec<FieldDecl> {
        let count = rng.next() % 12;
        (0..count)
            .map(|i| {
                let alignment = [1, 2, 4, 8, 16][rng.next() % 5];
                let size = 1 + rng.next() % 64;
                FieldDecl::new(format!("f{i}"), size, alignment)
            })
            .collect()
    }

    #[test]
    fn test_offsets_respect_alignment_and_stride_is_16() {
        let mut rng = Lcg(7);
        for _ in 0..500 {
            let layout = StructLayout::new(random_fields(&mut rng));
            assert_eq!(layout.stride() % STRUCT_ALIGNMENT, 0);
            let mut cursor = 0;
            for field in layout.fields() {
                assert_eq!(field.offset % field.alignment, 0);
                assert_eq!(field.offset, cursor + field.padding_before);
                cursor = field.offset + field.size;
            }
            assert!(layout.stride() >= cursor);
        }
    }

    #[test]
    fn test_identical_lists_give_identical_layouts() {
        let mut rng = Lcg(99);
        for _ in 0..100 {
            let fields = random_fields(&mut rng);
            assert_eq!(StructLayout::new(fields.clone()), StructLayout::new(fields));
        }
    }

    #[test]
    fn test_material_style_layout() {
        // float, vec4, bool -> 0, 16, 32; stride 48
        let layout = StructLayout::new([
            FieldDecl::new("shininess", 4, 4),
            FieldDecl::new("diffuseColor", 16, 16),
            FieldDecl::new("twoSided", 4, 4),
        ]);
        let offsets: Vec<_> = layout.fields().iter().map(|f| (f.offset, f.padding_before)).collect();
        assert_eq!(offsets, vec![(0, 0), (16, 12), (32, 0)]);
        assert_eq!(layout.stride(), 48);
    }

    #[test]
    fn test_empty_layout_has_zero_stride() {
        let layout = StructLayout::new(Vec::new());
        assert_eq!(layout.stride(), 0);
        assert!(StructArray::new(layout, 10).bytes().is_empty());
    }

    #[test]
    fn test_set_writes_at_index_times_stride() {
        let layout = StructLayout::new([FieldDecl::new("a", 4, 4), FieldDecl::new("color", 16, 16)]);
        let mut array = StructArray::new(layout, 3);
        assert_eq!(array.bytes().len(), 96);

        assert!(array.set(2, "color", FieldValue::Vec4([1.0, 2.0, 3.0, 4.0])));
        let element = array.element(2).unwrap();
        let y = f32::from_ne_bytes(element[20..24].try_into().unwrap());
        assert_eq!(y, 2.0);
        assert!(array.element(0).unwrap().iter().all(|b| *b == 0));
    }

    #[test]
    fn test_unknown_field_is_a_no_op() {
        let mut array = StructArray::new(StructLayout::new([FieldDecl::new("a", 4, 4)]), 1);
        let before = array.clone();
        assert!(!array.set(0, "missing", FieldValue::Float(1.0)));
        assert!(!array.set(5, "a", FieldValue::Float(1.0)));
        assert!(!array.set(0, "a", FieldValue::Vec4([0.0; 4])));
        assert_eq!(array, before);
    }

    #[test]
    fn test_element_out_of_range_is_none() {
        let array = StructArray::new(StructLayout::new([FieldDecl::new("a", 4, 4)]), 2);
        assert_eq!(array.element(1).map(<[u8]>::len), Some(16));
        assert!(array.element(2).is_none());
        assert!(array.element(usize::MAX).is_none());
    }

    #[test]
    fn test_bool_packs_as_u32() {
        let mut array = StructArray::new(StructLayout::new([FieldDecl::new("flag", 4, 4)]), 1);
        assert!(array.set(0, "flag", FieldValue::Bool(true)));
        assert_eq!(&array.bytes()[..4], &1u32.to_ne_bytes());
    }
}
