//! Raster cube model and read access.
//!
//! A cube is `rows x columns x bands` samples. The scorer only needs to read
//! one row of pixels at a time as band-interleaved-by-pixel (BIP) `f64`
//! values, which is what [`CubeAccessor::read_row`] provides. [`Cube`] is the
//! owned in-memory implementation; hosts with paged or on-disk storage
//! implement the trait themselves.

use std::ops::Range;

use crate::util::{SpectralError, SpectralResult};

pub mod roi;
pub mod wavelength;

pub use roi::Roi;
pub use wavelength::{BandGrid, WavelengthUnit};

/// Storage encoding of cube samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Encoding {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F32,
    F64,
    /// Complex pairs of 16-bit integers.
    ComplexI16,
    /// Complex pairs of 32-bit floats.
    ComplexF32,
}

impl Encoding {
    /// Returns true for complex-valued encodings.
    pub fn is_complex(self) -> bool {
        matches!(self, Encoding::ComplexI16 | Encoding::ComplexF32)
    }
}

/// Real-valued sample types that can back a [`Cube`].
pub trait Sample: Copy + Send + Sync + 'static {
    /// Encoding reported in the cube descriptor.
    const ENCODING: Encoding;

    /// Widens the sample to `f64`.
    fn to_f64(self) -> f64;
}

macro_rules! impl_sample {
    ($($ty:ty => $enc:ident),+ $(,)?) => {
        $(
            impl Sample for $ty {
                const ENCODING: Encoding = Encoding::$enc;

                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }
            }
        )+
    };
}

impl_sample!(
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    f32 => F32,
    f64 => F64,
);

/// Physical quantity stored in a cube or signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitKind {
    Reflectance,
    Radiance,
    Emissivity,
    Transmittance,
    Custom,
}

/// Amplitude units: a quantity kind and the factor from its standard scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Units {
    pub kind: UnitKind,
    pub scale_from_standard: f64,
}

impl Units {
    /// Creates units with an explicit scale from the standard representation.
    pub fn new(kind: UnitKind, scale_from_standard: f64) -> Self {
        Self {
            kind,
            scale_from_standard,
        }
    }

    /// Standard-scaled units of the given kind.
    pub fn standard(kind: UnitKind) -> Self {
        Self::new(kind, 1.0)
    }
}

/// Shape and metadata of a cube.
#[derive(Clone, Debug, PartialEq)]
pub struct CubeDescriptor {
    pub rows: usize,
    pub columns: usize,
    pub bands: usize,
    pub encoding: Encoding,
    /// Band wavelengths, absent when the cube carries no wavelength metadata.
    pub band_grid: Option<BandGrid>,
    pub units: Option<Units>,
}

/// Read access to a cube, shared by all workers of a scoring pass.
pub trait CubeAccessor: Sync {
    /// Returns the cube descriptor.
    fn descriptor(&self) -> &CubeDescriptor;

    /// Writes the BIP samples of `columns` on `row` into `out`.
    ///
    /// `out` has length `columns.len() * bands`.
    fn read_row(&self, row: usize, columns: Range<usize>, out: &mut [f64]) -> SpectralResult<()>;
}

/// Owned cube stored band-interleaved-by-pixel.
#[derive(Clone, Debug)]
pub struct Cube<T> {
    data: Vec<T>,
    descriptor: CubeDescriptor,
}

impl<T: Sample> Cube<T> {
    /// Creates a BIP cube from a contiguous buffer.
    pub fn new(data: Vec<T>, rows: usize, columns: usize, bands: usize) -> SpectralResult<Self> {
        if rows == 0 || columns == 0 || bands == 0 {
            return Err(SpectralError::InvalidDimensions {
                rows,
                columns,
                bands,
            });
        }
        let needed = rows
            .checked_mul(columns)
            .and_then(|v| v.checked_mul(bands))
            .ok_or(SpectralError::InvalidDimensions {
                rows,
                columns,
                bands,
            })?;
        if data.len() < needed {
            return Err(SpectralError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            descriptor: CubeDescriptor {
                rows,
                columns,
                bands,
                encoding: T::ENCODING,
                band_grid: None,
                units: None,
            },
        })
    }

    /// Attaches band wavelength metadata.
    pub fn with_band_grid(mut self, grid: BandGrid) -> SpectralResult<Self> {
        if grid.len() != self.descriptor.bands {
            return Err(SpectralError::InvalidCube {
                reason: "band grid length does not match band count",
            });
        }
        self.descriptor.band_grid = Some(grid);
        Ok(self)
    }

    /// Attaches amplitude units.
    pub fn with_units(mut self, units: Units) -> Self {
        self.descriptor.units = Some(units);
        self
    }

    /// Returns the samples of one pixel.
    pub fn pixel(&self, row: usize, column: usize) -> Option<&[T]> {
        let d = &self.descriptor;
        if row >= d.rows || column >= d.columns {
            return None;
        }
        let start = (row * d.columns + column) * d.bands;
        self.data.get(start..start + d.bands)
    }

    /// Returns the backing BIP buffer.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
}

impl<T: Sample> CubeAccessor for Cube<T> {
    fn descriptor(&self) -> &CubeDescriptor {
        &self.descriptor
    }

    fn read_row(&self, row: usize, columns: Range<usize>, out: &mut [f64]) -> SpectralResult<()> {
        let d = &self.descriptor;
        if row >= d.rows || columns.end > d.columns || columns.start > columns.end {
            return Err(SpectralError::CubeAccess {
                row,
                reason: format!("columns {columns:?} outside 0..{}", d.columns),
            });
        }
        let start = (row * d.columns + columns.start) * d.bands;
        let len = columns.len() * d.bands;
        let src = self
            .data
            .get(start..start + len)
            .ok_or_else(|| SpectralError::CubeAccess {
                row,
                reason: "row past end of buffer".to_owned(),
            })?;
        if out.len() < len {
            return Err(SpectralError::BufferTooSmall {
                needed: len,
                got: out.len(),
            });
        }
        for (dst, &value) in out.iter_mut().zip(src) {
            *dst = value.to_f64();
        }
        Ok(())
    }
}
