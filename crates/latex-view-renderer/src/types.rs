use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;

use crate::error::{ErrorCategory, RenderError};

/// One math segment plus the style it should be rendered with.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub notation: String,
    /// Glyph scale.
    pub size_hint: f32,
    /// Packed ARGB colour.
    pub color_hint: u32,
    /// Layout width the artifact should fit in.
    pub max_width: u32,
}

impl RenderRequest {
    pub fn new(notation: impl Into<String>, size_hint: f32, color_hint: u32, max_width: u32) -> Self {
        Self {
            notation: notation.into(),
            size_hint,
            color_hint,
            max_width,
        }
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::for_request(self)
    }
}

/// Memoization key for a [`RenderRequest`].
///
/// A blake3 digest over the length-prefixed notation and the exact bit
/// patterns of the style fields, so only true duplicates collide.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    pub fn for_request(request: &RenderRequest) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(request.notation.len() as u64).to_le_bytes());
        hasher.update(request.notation.as_bytes());
        hasher.update(&request.size_hint.to_bits().to_le_bytes());
        hasher.update(&request.color_hint.to_le_bytes());
        hasher.update(&request.max_width.to_le_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey(")?;
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}

/// Output of a render engine: measured dimensions and the rendered bytes.
///
/// Dimensions are signed so engines can report degenerate sizes, which the
/// pipeline turns into [`RenderError::InvalidDimensions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub width: i32,
    pub height: i32,
    pub data: Bytes,
}

impl Artifact {
    pub fn new(width: i32, height: i32, data: impl Into<Bytes>) -> Self {
        Self {
            width,
            height,
            data: data.into(),
        }
    }

    /// Bytes charged against the cache budget.
    pub fn byte_size(&self) -> usize {
        self.data.len()
    }
}

/// A successfully rendered segment. The artifact is shared with the cache
/// and read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMath {
    pub width: u32,
    pub height: u32,
    pub artifact: Arc<Artifact>,
}

impl RenderedMath {
    /// Wrap an artifact, rejecting non-positive dimensions.
    pub fn from_artifact(artifact: Arc<Artifact>) -> Result<Self, RenderError> {
        if artifact.width <= 0 || artifact.height <= 0 {
            return Err(RenderError::InvalidDimensions {
                width: artifact.width,
                height: artifact.height,
            });
        }
        Ok(Self {
            width: artifact.width.unsigned_abs(),
            height: artifact.height.unsigned_abs(),
            artifact,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderResult {
    Success(RenderedMath),
    Error(RenderError),
}

impl RenderResult {
    pub fn is_success(&self) -> bool {
        matches!(self, RenderResult::Success(_))
    }

    pub fn into_result(self) -> Result<RenderedMath, RenderError> {
        match self {
            RenderResult::Success(math) => Ok(math),
            RenderResult::Error(error) => Err(error),
        }
    }

    /// Shape handed to host UIs: `{ok, width, height, artifact}` or
    /// `{ok, category, message}`. The artifact goes out as its markup text.
    pub fn to_payload(&self) -> RenderPayload {
        match self {
            RenderResult::Success(math) => RenderPayload::Rendered {
                ok: true,
                width: math.width,
                height: math.height,
                artifact: String::from_utf8_lossy(&math.artifact.data).into_owned(),
            },
            RenderResult::Error(error) => RenderPayload::Failed {
                ok: false,
                category: error.category(),
                message: error.to_string(),
            },
        }
    }
}

impl From<Result<RenderedMath, RenderError>> for RenderResult {
    fn from(result: Result<RenderedMath, RenderError>) -> Self {
        match result {
            Ok(math) => RenderResult::Success(math),
            Err(error) => RenderResult::Error(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RenderPayload {
    Rendered {
        ok: bool,
        width: u32,
        height: u32,
        artifact: String,
    },
    Failed {
        ok: bool,
        category: ErrorCategory,
        message: String,
    },
}
