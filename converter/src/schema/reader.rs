//! Read accessors over a verified TFLite flatbuffer, shaped like `flatc --rust` output.
//!
//! Every accessor assumes the buffer went through `flatbuffers::root`, which runs the
//! `Verifiable` impls below before handing out the root table.

use flatbuffers::{
    Follow, ForwardsUOffset, InvalidFlatbuffer, Table, VOffsetT, Vector, Verifiable, Verifier,
};

type Tables<'a, T> = Vector<'a, ForwardsUOffset<T>>;

macro_rules! table {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy)]
        pub struct $name<'a> {
            _tab: Table<'a>,
        }

        impl<'a> Follow<'a> for $name<'a> {
            type Inner = $name<'a>;

            #[inline]
            unsafe fn follow(buf: &'a [u8], loc: usize) -> Self::Inner {
                Self {
                    _tab: unsafe { Table::new(buf, loc) },
                }
            }
        }
    };
}

table!(
    /// The root table.
    Model
);

impl<'a> Model<'a> {
    pub const VT_VERSION: VOffsetT = 4;
    pub const VT_OPERATOR_CODES: VOffsetT = 6;
    pub const VT_SUBGRAPHS: VOffsetT = 8;
    pub const VT_DESCRIPTION: VOffsetT = 10;
    pub const VT_BUFFERS: VOffsetT = 12;
    pub const VT_METADATA: VOffsetT = 16;
    pub const VT_SIGNATURE_DEFS: VOffsetT = 18;

    pub fn version(&self) -> u32 {
        unsafe { self._tab.get::<u32>(Self::VT_VERSION, Some(0)).unwrap_or(0) }
    }

    pub fn operator_codes(&self) -> Option<Tables<'a, OperatorCode<'a>>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Tables<'a, OperatorCode<'a>>>>(Self::VT_OPERATOR_CODES, None)
        }
    }

    pub fn subgraphs(&self) -> Option<Tables<'a, SubGraph<'a>>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Tables<'a, SubGraph<'a>>>>(Self::VT_SUBGRAPHS, None)
        }
    }

    pub fn description(&self) -> Option<&'a str> {
        unsafe { self._tab.get::<ForwardsUOffset<&str>>(Self::VT_DESCRIPTION, None) }
    }

    pub fn buffers(&self) -> Option<Tables<'a, Buffer<'a>>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Tables<'a, Buffer<'a>>>>(Self::VT_BUFFERS, None)
        }
    }

    pub fn metadata(&self) -> Option<Tables<'a, Metadata<'a>>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Tables<'a, Metadata<'a>>>>(Self::VT_METADATA, None)
        }
    }

    pub fn signature_defs(&self) -> Option<Tables<'a, SignatureDef<'a>>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Tables<'a, SignatureDef<'a>>>>(Self::VT_SIGNATURE_DEFS, None)
        }
    }
}

impl Verifiable for Model<'_> {
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<u32>("version", Self::VT_VERSION, false)?
            .visit_field::<ForwardsUOffset<Tables<'_, OperatorCode>>>(
                "operator_codes",
                Self::VT_OPERATOR_CODES,
                false,
            )?
            .visit_field::<ForwardsUOffset<Tables<'_, SubGraph>>>(
                "subgraphs",
                Self::VT_SUBGRAPHS,
                false,
            )?
            .visit_field::<ForwardsUOffset<&str>>("description", Self::VT_DESCRIPTION, false)?
            .visit_field::<ForwardsUOffset<Tables<'_, Buffer>>>("buffers", Self::VT_BUFFERS, false)?
            .visit_field::<ForwardsUOffset<Tables<'_, Metadata>>>(
                "metadata",
                Self::VT_METADATA,
                false,
            )?
            .visit_field::<ForwardsUOffset<Tables<'_, SignatureDef>>>(
                "signature_defs",
                Self::VT_SIGNATURE_DEFS,
                false,
            )?
            .finish();
        Ok(())
    }
}

table!(OperatorCode);

impl OperatorCode<'_> {
    pub const VT_DEPRECATED_BUILTIN_CODE: VOffsetT = 4;
    pub const VT_VERSION: VOffsetT = 8;
    pub const VT_BUILTIN_CODE: VOffsetT = 10;

    /// The builtin code, falling back to the pre 2.3 one-byte field for old files.
    pub fn builtin_code(&self) -> i32 {
        let code = unsafe { self._tab.get::<i32>(Self::VT_BUILTIN_CODE, Some(0)).unwrap_or(0) };
        let deprecated =
            unsafe { self._tab.get::<i8>(Self::VT_DEPRECATED_BUILTIN_CODE, Some(0)).unwrap_or(0) };

        code.max(deprecated as i32)
    }

    pub fn version(&self) -> i32 {
        unsafe { self._tab.get::<i32>(Self::VT_VERSION, Some(1)).unwrap_or(1) }
    }
}

impl Verifiable for OperatorCode<'_> {
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<i8>(
                "deprecated_builtin_code",
                Self::VT_DEPRECATED_BUILTIN_CODE,
                false,
            )?
            .visit_field::<i32>("version", Self::VT_VERSION, false)?
            .visit_field::<i32>("builtin_code", Self::VT_BUILTIN_CODE, false)?
            .finish();
        Ok(())
    }
}

table!(SubGraph);

impl<'a> SubGraph<'a> {
    pub const VT_TENSORS: VOffsetT = 4;
    pub const VT_INPUTS: VOffsetT = 6;
    pub const VT_OUTPUTS: VOffsetT = 8;
    pub const VT_OPERATORS: VOffsetT = 10;
    pub const VT_NAME: VOffsetT = 12;

    pub fn tensors(&self) -> Option<Tables<'a, Tensor<'a>>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Tables<'a, Tensor<'a>>>>(Self::VT_TENSORS, None)
        }
    }

    pub fn inputs(&self) -> Option<Vector<'a, i32>> {
        unsafe { self._tab.get::<ForwardsUOffset<Vector<'a, i32>>>(Self::VT_INPUTS, None) }
    }

    pub fn outputs(&self) -> Option<Vector<'a, i32>> {
        unsafe { self._tab.get::<ForwardsUOffset<Vector<'a, i32>>>(Self::VT_OUTPUTS, None) }
    }

    pub fn operators(&self) -> Option<Tables<'a, Operator<'a>>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Tables<'a, Operator<'a>>>>(Self::VT_OPERATORS, None)
        }
    }

    pub fn name(&self) -> Option<&'a str> {
        unsafe { self._tab.get::<ForwardsUOffset<&str>>(Self::VT_NAME, None) }
    }
}

impl Verifiable for SubGraph<'_> {
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<ForwardsUOffset<Tables<'_, Tensor>>>("tensors", Self::VT_TENSORS, false)?
            .visit_field::<ForwardsUOffset<Vector<'_, i32>>>("inputs", Self::VT_INPUTS, false)?
            .visit_field::<ForwardsUOffset<Vector<'_, i32>>>("outputs", Self::VT_OUTPUTS, false)?
            .visit_field::<ForwardsUOffset<Tables<'_, Operator>>>(
                "operators",
                Self::VT_OPERATORS,
                false,
            )?
            .visit_field::<ForwardsUOffset<&str>>("name", Self::VT_NAME, false)?
            .finish();
        Ok(())
    }
}

table!(Tensor);

impl<'a> Tensor<'a> {
    pub const VT_SHAPE: VOffsetT = 4;
    pub const VT_TYPE: VOffsetT = 6;
    pub const VT_BUFFER: VOffsetT = 8;
    pub const VT_NAME: VOffsetT = 10;
    pub const VT_QUANTIZATION: VOffsetT = 12;
    pub const VT_SHAPE_SIGNATURE: VOffsetT = 18;

    pub fn shape(&self) -> Option<Vector<'a, i32>> {
        unsafe { self._tab.get::<ForwardsUOffset<Vector<'a, i32>>>(Self::VT_SHAPE, None) }
    }

    pub fn type_(&self) -> i8 {
        unsafe { self._tab.get::<i8>(Self::VT_TYPE, Some(0)).unwrap_or(0) }
    }

    pub fn buffer(&self) -> u32 {
        unsafe { self._tab.get::<u32>(Self::VT_BUFFER, Some(0)).unwrap_or(0) }
    }

    pub fn name(&self) -> Option<&'a str> {
        unsafe { self._tab.get::<ForwardsUOffset<&str>>(Self::VT_NAME, None) }
    }

    pub fn quantization(&self) -> Option<QuantizationParameters<'a>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<QuantizationParameters<'a>>>(Self::VT_QUANTIZATION, None)
        }
    }

    pub fn shape_signature(&self) -> Option<Vector<'a, i32>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, i32>>>(Self::VT_SHAPE_SIGNATURE, None)
        }
    }
}

impl Verifiable for Tensor<'_> {
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<ForwardsUOffset<Vector<'_, i32>>>("shape", Self::VT_SHAPE, false)?
            .visit_field::<i8>("type", Self::VT_TYPE, false)?
            .visit_field::<u32>("buffer", Self::VT_BUFFER, false)?
            .visit_field::<ForwardsUOffset<&str>>("name", Self::VT_NAME, false)?
            .visit_field::<ForwardsUOffset<QuantizationParameters>>(
                "quantization",
                Self::VT_QUANTIZATION,
                false,
            )?
            .visit_field::<ForwardsUOffset<Vector<'_, i32>>>(
                "shape_signature",
                Self::VT_SHAPE_SIGNATURE,
                false,
            )?
            .finish();
        Ok(())
    }
}

table!(QuantizationParameters);

impl<'a> QuantizationParameters<'a> {
    pub const VT_SCALE: VOffsetT = 8;
    pub const VT_ZERO_POINT: VOffsetT = 10;
    pub const VT_QUANTIZED_DIMENSION: VOffsetT = 16;

    pub fn scale(&self) -> Option<Vector<'a, f32>> {
        unsafe { self._tab.get::<ForwardsUOffset<Vector<'a, f32>>>(Self::VT_SCALE, None) }
    }

    pub fn zero_point(&self) -> Option<Vector<'a, i64>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, i64>>>(Self::VT_ZERO_POINT, None)
        }
    }

    pub fn quantized_dimension(&self) -> i32 {
        unsafe { self._tab.get::<i32>(Self::VT_QUANTIZED_DIMENSION, Some(0)).unwrap_or(0) }
    }
}

impl Verifiable for QuantizationParameters<'_> {
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<ForwardsUOffset<Vector<'_, f32>>>("scale", Self::VT_SCALE, false)?
            .visit_field::<ForwardsUOffset<Vector<'_, i64>>>(
                "zero_point",
                Self::VT_ZERO_POINT,
                false,
            )?
            .visit_field::<i32>(
                "quantized_dimension",
                Self::VT_QUANTIZED_DIMENSION,
                false,
            )?
            .finish();
        Ok(())
    }
}

table!(Operator);

impl<'a> Operator<'a> {
    pub const VT_OPCODE_INDEX: VOffsetT = 4;
    pub const VT_INPUTS: VOffsetT = 6;
    pub const VT_OUTPUTS: VOffsetT = 8;
    pub const VT_BUILTIN_OPTIONS_TYPE: VOffsetT = 10;
    pub const VT_BUILTIN_OPTIONS: VOffsetT = 12;

    pub fn opcode_index(&self) -> u32 {
        unsafe { self._tab.get::<u32>(Self::VT_OPCODE_INDEX, Some(0)).unwrap_or(0) }
    }

    pub fn inputs(&self) -> Option<Vector<'a, i32>> {
        unsafe { self._tab.get::<ForwardsUOffset<Vector<'a, i32>>>(Self::VT_INPUTS, None) }
    }

    pub fn outputs(&self) -> Option<Vector<'a, i32>> {
        unsafe { self._tab.get::<ForwardsUOffset<Vector<'a, i32>>>(Self::VT_OUTPUTS, None) }
    }

    /// The `BuiltinOptions` union tag, see `schema::OptionsType`.
    pub fn builtin_options_type(&self) -> u8 {
        unsafe { self._tab.get::<u8>(Self::VT_BUILTIN_OPTIONS_TYPE, Some(0)).unwrap_or(0) }
    }
}

impl Verifiable for Operator<'_> {
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<u32>("opcode_index", Self::VT_OPCODE_INDEX, false)?
            .visit_field::<ForwardsUOffset<Vector<'_, i32>>>("inputs", Self::VT_INPUTS, false)?
            .visit_field::<ForwardsUOffset<Vector<'_, i32>>>("outputs", Self::VT_OUTPUTS, false)?
            .visit_field::<u8>(
                "builtin_options_type",
                Self::VT_BUILTIN_OPTIONS_TYPE,
                false,
            )?
            .finish();
        Ok(())
    }
}

table!(Buffer);

impl<'a> Buffer<'a> {
    pub const VT_DATA: VOffsetT = 4;

    pub fn data(&self) -> Option<Vector<'a, u8>> {
        unsafe { self._tab.get::<ForwardsUOffset<Vector<'a, u8>>>(Self::VT_DATA, None) }
    }
}

impl Verifiable for Buffer<'_> {
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<ForwardsUOffset<Vector<'_, u8>>>("data", Self::VT_DATA, false)?
            .finish();
        Ok(())
    }
}

table!(Metadata);

impl<'a> Metadata<'a> {
    pub const VT_NAME: VOffsetT = 4;
    pub const VT_BUFFER: VOffsetT = 6;

    pub fn name(&self) -> Option<&'a str> {
        unsafe { self._tab.get::<ForwardsUOffset<&str>>(Self::VT_NAME, None) }
    }

    pub fn buffer(&self) -> u32 {
        unsafe { self._tab.get::<u32>(Self::VT_BUFFER, Some(0)).unwrap_or(0) }
    }
}

impl Verifiable for Metadata<'_> {
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<ForwardsUOffset<&str>>("name", Self::VT_NAME, false)?
            .visit_field::<u32>("buffer", Self::VT_BUFFER, false)?
            .finish();
        Ok(())
    }
}

table!(SignatureDef);

impl<'a> SignatureDef<'a> {
    pub const VT_INPUTS: VOffsetT = 4;
    pub const VT_OUTPUTS: VOffsetT = 6;
    pub const VT_SIGNATURE_KEY: VOffsetT = 8;
    pub const VT_SUBGRAPH_INDEX: VOffsetT = 12;

    pub fn inputs(&self) -> Option<Tables<'a, TensorMap<'a>>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Tables<'a, TensorMap<'a>>>>(Self::VT_INPUTS, None)
        }
    }

    pub fn outputs(&self) -> Option<Tables<'a, TensorMap<'a>>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Tables<'a, TensorMap<'a>>>>(Self::VT_OUTPUTS, None)
        }
    }

    pub fn signature_key(&self) -> Option<&'a str> {
        unsafe { self._tab.get::<ForwardsUOffset<&str>>(Self::VT_SIGNATURE_KEY, None) }
    }
}

impl Verifiable for SignatureDef<'_> {
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<ForwardsUOffset<Tables<'_, TensorMap>>>("inputs", Self::VT_INPUTS, false)?
            .visit_field::<ForwardsUOffset<Tables<'_, TensorMap>>>(
                "outputs",
                Self::VT_OUTPUTS,
                false,
            )?
            .visit_field::<ForwardsUOffset<&str>>("signature_key", Self::VT_SIGNATURE_KEY, false)?
            .visit_field::<u32>("subgraph_index", Self::VT_SUBGRAPH_INDEX, false)?
            .finish();
        Ok(())
    }
}

table!(TensorMap);

impl<'a> TensorMap<'a> {
    pub const VT_NAME: VOffsetT = 4;
    pub const VT_TENSOR_INDEX: VOffsetT = 6;

    pub fn name(&self) -> Option<&'a str> {
        unsafe { self._tab.get::<ForwardsUOffset<&str>>(Self::VT_NAME, None) }
    }

    pub fn tensor_index(&self) -> u32 {
        unsafe { self._tab.get::<u32>(Self::VT_TENSOR_INDEX, Some(0)).unwrap_or(0) }
    }
}

impl Verifiable for TensorMap<'_> {
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<ForwardsUOffset<&str>>("name", Self::VT_NAME, false)?
            .visit_field::<u32>("tensor_index", Self::VT_TENSOR_INDEX, false)?
            .finish();
        Ok(())
    }
}
