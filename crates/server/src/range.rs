#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeError {
    Invalid,
    Unsatisfiable,
}

/// What to send for a given `Range` header and resource size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangePlan {
    Full,
    Partial(ByteRange),
    Unsatisfiable,
}

impl RangePlan {
    /// Malformed and multi-range headers are ignored and the whole resource
    /// is served.
    pub fn resolve(header: Option<&str>, size: u64) -> Self {
        match header.map(|value| parse_range_header(value, size)) {
            None | Some(Err(RangeError::Invalid)) => RangePlan::Full,
            Some(Err(RangeError::Unsatisfiable)) => RangePlan::Unsatisfiable,
            Some(Ok(range)) => RangePlan::Partial(range),
        }
    }
}

pub fn unsatisfied_range(size: u64) -> String {
    format!("bytes */{}", size)
}

pub fn parse_range_header(value: &str, size: u64) -> Result<ByteRange, RangeError> {
    let value = value.trim();
    let spec = match value.get(..6) {
        Some(unit) if unit.eq_ignore_ascii_case("bytes=") => value[6..].trim(),
        _ => return Err(RangeError::Invalid),
    };
    if spec.contains(',') {
        return Err(RangeError::Invalid);
    }
    if size == 0 {
        return Err(RangeError::Unsatisfiable);
    }

    if let Some(suffix) = spec.strip_prefix('-') {
        let suffix: u64 = suffix.trim().parse().map_err(|_| RangeError::Invalid)?;
        if suffix == 0 {
            return Err(RangeError::Unsatisfiable);
        }
        return Ok(ByteRange {
            start: size.saturating_sub(suffix),
            end: size - 1,
        });
    }

    let (start_str, end_str) = spec.split_once('-').ok_or(RangeError::Invalid)?;
    let start: u64 = start_str.trim().parse().map_err(|_| RangeError::Invalid)?;
    let end = match end_str.trim() {
        "" => None,
        text => Some(text.parse::<u64>().map_err(|_| RangeError::Invalid)?),
    };
    if let Some(end) = end {
        if end < start {
            return Err(RangeError::Invalid);
        }
    }
    if start >= size {
        return Err(RangeError::Unsatisfiable);
    }

    Ok(ByteRange {
        start,
        end: end.map(|end| end.min(size - 1)).unwrap_or(size - 1),
    })
}
