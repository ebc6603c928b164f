//! QR Code Model 2 symbol construction.
//!
//! Builds the module matrix for a payload at a caller-chosen version (1–40) and error
//! correction level. The payload is placed in a single segment: numeric when it is made
//! only of ASCII digits, alphanumeric when every byte belongs to the 45-character QR
//! alphanumeric set, and byte mode otherwise. The mask pattern is chosen automatically
//! by lowest penalty score, so the same inputs always yield the same matrix.
//!
//! # Example
//!
//! ```rust
//! use qrartifact::qrcode::{EcLevel, QrCode, Version};
//!
//! let qr = QrCode::encode(b"ABC123", Version::MIN, EcLevel::L).unwrap();
//! assert_eq!(qr.size(), 21);
//! assert!(qr.is_dark(0, 0));
//! ```

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{QrArtifactError, Result};

/// Error correction level of a QR symbol.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize)]
pub enum EcLevel {
    /// Tolerates ~7% erroneous codewords.
    #[default]
    L,
    /// Tolerates ~15% erroneous codewords.
    M,
    /// Tolerates ~25% erroneous codewords.
    Q,
    /// Tolerates ~30% erroneous codewords.
    H,
}

impl EcLevel {
    fn ordinal(self) -> usize {
        match self {
            EcLevel::L => 0,
            EcLevel::M => 1,
            EcLevel::Q => 2,
            EcLevel::H => 3,
        }
    }

    /// Two-bit value written into the format information.
    fn format_bits(self) -> u32 {
        match self {
            EcLevel::L => 1,
            EcLevel::M => 0,
            EcLevel::Q => 3,
            EcLevel::H => 2,
        }
    }
}

impl fmt::Display for EcLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EcLevel::L => "L",
            EcLevel::M => "M",
            EcLevel::Q => "Q",
            EcLevel::H => "H",
        };
        f.write_str(name)
    }
}

/// A QR symbol version (1–40), selecting the symbol size and capacity tier.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Version(u8);

impl Version {
    /// The smallest symbol, 21×21 modules.
    pub const MIN: Version = Version(1);

    /// The largest symbol, 177×177 modules.
    pub const MAX: Version = Version(40);

    /// Checked constructor.
    pub fn new(value: u8) -> Result<Self> {
        if (Self::MIN.0..=Self::MAX.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(QrArtifactError::InvalidVersion(value))
        }
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    /// Width and height of the symbol in modules.
    pub const fn side(self) -> usize {
        self.0 as usize * 4 + 17
    }

    fn next(self) -> Option<Self> {
        (self.0 < Self::MAX.0).then(|| Self(self.0 + 1))
    }

    /// Number of data bits the version holds at the given level, after ECC.
    pub fn data_capacity_bits(self, ec: EcLevel) -> usize {
        self.data_codewords(ec) * 8
    }

    fn data_codewords(self, ec: EcLevel) -> usize {
        self.raw_data_modules() / 8
            - table_get(&ECC_CODEWORDS_PER_BLOCK, self, ec) * table_get(&NUM_ERROR_CORRECTION_BLOCKS, self, ec)
    }

    /// Modules left for data and ECC once every function pattern is drawn.
    fn raw_data_modules(self) -> usize {
        let ver = usize::from(self.0);
        let mut modules = (16 * ver + 128) * ver + 64;
        if ver >= 2 {
            let align = ver / 7 + 2;
            modules -= (25 * align - 10) * align - 55;
            if ver >= 7 {
                modules -= 36;
            }
        }
        modules
    }

    fn alignment_centers(self) -> Vec<usize> {
        let ver = usize::from(self.0);
        if ver == 1 {
            return Vec::new();
        }
        let count = ver / 7 + 2;
        let step = if ver == 32 {
            26
        } else {
            (ver * 4 + count * 2 + 1) / (count * 2 - 2) * 2
        };
        let mut centers: Vec<usize> = (0..count - 1).map(|i| self.side() - 7 - i * step).collect();
        centers.push(6);
        centers.reverse();
        centers
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One of the eight data mask patterns.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Mask(u8);

impl Mask {
    pub const fn value(self) -> u8 {
        self.0
    }

    fn inverts(self, x: usize, y: usize) -> bool {
        match self.0 {
            0 => (x + y) % 2 == 0,
            1 => y % 2 == 0,
            2 => x % 3 == 0,
            3 => (x + y) % 3 == 0,
            4 => (x / 3 + y / 2) % 2 == 0,
            5 => x * y % 2 + x * y % 3 == 0,
            6 => (x * y % 2 + x * y % 3) % 2 == 0,
            _ => ((x + y) % 2 + x * y % 3) % 2 == 0,
        }
    }
}

/// An encoded QR symbol. Immutable once built.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct QrCode {
    version: Version,
    ec: EcLevel,
    mask: Mask,
    size: usize,
    modules: Vec<bool>,
}

impl QrCode {
    /// Encodes `data` at exactly `version`.
    ///
    /// Fails with [`QrArtifactError::CapacityExceeded`] when the payload does not fit.
    pub fn encode(data: &[u8], version: Version, ec: EcLevel) -> Result<Self> {
        let segment = Segment::for_payload(data);
        let codewords = segment.data_codewords(version, ec)?;
        Ok(Self::from_codewords(version, ec, &codewords))
    }

    /// Encodes `data` at the smallest version `>= min_version` that holds it.
    pub fn encode_fit(data: &[u8], min_version: Version, ec: EcLevel) -> Result<Self> {
        let segment = Segment::for_payload(data);
        let mut version = min_version;
        loop {
            match segment.data_codewords(version, ec) {
                Ok(codewords) => return Ok(Self::from_codewords(version, ec, &codewords)),
                Err(err) => match version.next() {
                    Some(next) => version = next,
                    None => return Err(err),
                },
            }
        }
    }

    fn from_codewords(version: Version, ec: EcLevel, data: &[u8]) -> Self {
        let mut canvas = Canvas::new(version, ec);
        canvas.draw_function_patterns();
        canvas.place_codewords(&add_ecc_and_interleave(data, version, ec));

        let mut best = (i32::MAX, Mask(0));
        for mask in (0..8).map(Mask) {
            canvas.apply_mask(mask);
            canvas.draw_format_bits(mask);
            let penalty = canvas.penalty();
            if penalty < best.0 {
                best = (penalty, mask);
            }
            // XOR again to undo
            canvas.apply_mask(mask);
        }
        let mask = best.1;
        canvas.apply_mask(mask);
        canvas.draw_format_bits(mask);

        QrCode {
            version,
            ec,
            mask,
            size: canvas.size,
            modules: canvas.dark,
        }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn ec_level(&self) -> EcLevel {
        self.ec
    }

    pub fn mask(&self) -> Mask {
        self.mask
    }

    /// Width and height in modules, between 21 and 177.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether the module at (`x`, `y`) is dark. Coordinates outside the symbol are light.
    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        x < self.size && y < self.size && self.modules[y * self.size + x]
    }
}

/// Mutable module grid used while a symbol is being assembled.
struct Canvas {
    version: Version,
    ec: EcLevel,
    size: usize,
    dark: Vec<bool>,
    reserved: Vec<bool>,
}

impl Canvas {
    fn new(version: Version, ec: EcLevel) -> Self {
        let size = version.side();
        Self {
            version,
            ec,
            size,
            dark: vec![false; size * size],
            reserved: vec![false; size * size],
        }
    }

    fn set_function(&mut self, x: usize, y: usize, dark: bool) {
        let index = y * self.size + x;
        self.dark[index] = dark;
        self.reserved[index] = true;
    }

    fn draw_function_patterns(&mut self) {
        let size = self.size;
        for i in 0..size {
            self.set_function(6, i, i % 2 == 0);
            self.set_function(i, 6, i % 2 == 0);
        }

        self.draw_finder(3, 3);
        self.draw_finder(size - 4, 3);
        self.draw_finder(3, size - 4);

        let centers = self.version.alignment_centers();
        let last = centers.len().saturating_sub(1);
        for (i, &cx) in centers.iter().enumerate() {
            for (j, &cy) in centers.iter().enumerate() {
                let overlaps_finder = (i == 0 && j == 0) || (i == 0 && j == last) || (i == last && j == 0);
                if !overlaps_finder {
                    self.draw_alignment(cx, cy);
                }
            }
        }

        // Placeholder so the format area is reserved before data placement
        self.draw_format_bits(Mask(0));
        self.draw_version_bits();
    }

    fn draw_finder(&mut self, cx: usize, cy: usize) {
        let size = self.size as i64;
        for dy in -4i64..=4 {
            for dx in -4i64..=4 {
                let x = cx as i64 + dx;
                let y = cy as i64 + dy;
                if (0..size).contains(&x) && (0..size).contains(&y) {
                    let ring = dx.abs().max(dy.abs());
                    self.set_function(x as usize, y as usize, ring != 2 && ring != 4);
                }
            }
        }
    }

    fn draw_alignment(&mut self, cx: usize, cy: usize) {
        for dy in 0..5usize {
            for dx in 0..5usize {
                let ring = dx.abs_diff(2).max(dy.abs_diff(2));
                self.set_function(cx + dx - 2, cy + dy - 2, ring != 1);
            }
        }
    }

    fn draw_format_bits(&mut self, mask: Mask) {
        let data = (self.ec.format_bits() << 3) | u32::from(mask.0);
        let mut rem = data;
        for _ in 0..10 {
            rem = (rem << 1) ^ ((rem >> 9) * 0x537);
        }
        let bits = ((data << 10) | rem) ^ 0x5412;

        // Copy next to the top-left finder
        for i in 0..6 {
            self.set_function(8, i, bit(bits, i));
        }
        self.set_function(8, 7, bit(bits, 6));
        self.set_function(8, 8, bit(bits, 7));
        self.set_function(7, 8, bit(bits, 8));
        for i in 9..15 {
            self.set_function(14 - i, 8, bit(bits, i));
        }

        // Copy split between the other two finders
        let size = self.size;
        for i in 0..8 {
            self.set_function(size - 1 - i, 8, bit(bits, i));
        }
        for i in 8..15 {
            self.set_function(8, size - 15 + i, bit(bits, i));
        }
        self.set_function(8, size - 8, true);
    }

    fn draw_version_bits(&mut self) {
        let ver = u32::from(self.version.value());
        if ver < 7 {
            return;
        }
        let mut rem = ver;
        for _ in 0..12 {
            rem = (rem << 1) ^ ((rem >> 11) * 0x1f25);
        }
        let bits = (ver << 12) | rem;
        for i in 0..18 {
            let dark = bit(bits, i);
            let a = self.size - 11 + i % 3;
            let b = i / 3;
            self.set_function(a, b, dark);
            self.set_function(b, a, dark);
        }
    }

    /// Zigzags the codewords through every module not reserved by a function pattern.
    fn place_codewords(&mut self, codewords: &[u8]) {
        let total = codewords.len() * 8;
        let mut i = 0usize;
        let mut right = self.size - 1;
        while right >= 1 {
            if right == 6 {
                right = 5;
            }
            let upward = (right + 1) & 2 == 0;
            for vert in 0..self.size {
                let y = if upward { self.size - 1 - vert } else { vert };
                for x in [right, right - 1] {
                    let index = y * self.size + x;
                    if !self.reserved[index] && i < total {
                        self.dark[index] = bit(u32::from(codewords[i >> 3]), 7 - (i & 7));
                        i += 1;
                    }
                }
            }
            if right < 2 {
                break;
            }
            right -= 2;
        }
        debug_assert_eq!(i, total);
    }

    fn apply_mask(&mut self, mask: Mask) {
        for y in 0..self.size {
            for x in 0..self.size {
                let index = y * self.size + x;
                if !self.reserved[index] && mask.inverts(x, y) {
                    self.dark[index] = !self.dark[index];
                }
            }
        }
    }

    fn penalty(&self) -> i32 {
        let size = self.size;
        let mut score = 0;
        for y in 0..size {
            score += self.line_penalty(|x| self.dark[y * size + x]);
        }
        for x in 0..size {
            score += self.line_penalty(|y| self.dark[y * size + x]);
        }

        for y in 0..size - 1 {
            for x in 0..size - 1 {
                let color = self.dark[y * size + x];
                if color == self.dark[y * size + x + 1]
                    && color == self.dark[(y + 1) * size + x]
                    && color == self.dark[(y + 1) * size + x + 1]
                {
                    score += PENALTY_N2;
                }
            }
        }

        let dark = self.dark.iter().filter(|&&d| d).count() as i32;
        let total = (size * size) as i32;
        let k = ((dark * 20 - total * 10).abs() + total - 1) / total - 1;
        score + k * PENALTY_N4
    }

    /// Run-length and finder-lookalike penalties along one row or column.
    fn line_penalty(&self, cell: impl Fn(usize) -> bool) -> i32 {
        let mut score = 0;
        let mut color = false;
        let mut run = 0i32;
        let mut history = RunHistory::new(self.size);
        for i in 0..self.size {
            let dark = cell(i);
            if dark == color {
                run += 1;
                if run == 5 {
                    score += PENALTY_N1;
                } else if run > 5 {
                    score += 1;
                }
            } else {
                history.push(run);
                if !color {
                    score += history.finder_like() * PENALTY_N3;
                }
                color = dark;
                run = 1;
            }
        }
        score + history.finish(color, run) * PENALTY_N3
    }
}

/// The last seven run lengths of a line scan, newest first.
struct RunHistory {
    size: i32,
    runs: [i32; 7],
}

impl RunHistory {
    fn new(size: usize) -> Self {
        Self {
            size: size as i32,
            runs: [0; 7],
        }
    }

    fn push(&mut self, mut run: i32) {
        // The light border outside the symbol counts as part of the first run
        if self.runs[0] == 0 {
            run += self.size;
        }
        self.runs.copy_within(0..6, 1);
        self.runs[0] = run;
    }

    fn finder_like(&self) -> i32 {
        let r = &self.runs;
        let n = r[1];
        let core = n > 0 && r[2] == n && r[3] == n * 3 && r[4] == n && r[5] == n;
        i32::from(core && r[0] >= n * 4 && r[6] >= n) + i32::from(core && r[6] >= n * 4 && r[0] >= n)
    }

    fn finish(mut self, color: bool, mut run: i32) -> i32 {
        if color {
            self.push(run);
            run = 0;
        }
        run += self.size;
        self.push(run);
        self.finder_like()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Mode {
    Numeric,
    Alphanumeric,
    Byte,
}

impl Mode {
    fn indicator(self) -> u32 {
        match self {
            Mode::Numeric => 0x1,
            Mode::Alphanumeric => 0x2,
            Mode::Byte => 0x4,
        }
    }

    fn char_count_bits(self, version: Version) -> usize {
        let tier = usize::from((version.value() + 7) / 17);
        match self {
            Mode::Numeric => [10, 12, 14][tier],
            Mode::Alphanumeric => [9, 11, 13][tier],
            Mode::Byte => [8, 16, 16][tier],
        }
    }
}

struct Segment {
    mode: Mode,
    chars: usize,
    bits: BitBuffer,
}

impl Segment {
    fn for_payload(data: &[u8]) -> Self {
        if data.iter().all(u8::is_ascii_digit) {
            return Self::numeric(data);
        }
        match data.iter().map(|&b| alphanumeric_value(b)).collect::<Option<Vec<u32>>>() {
            Some(values) => Self::alphanumeric(&values),
            None => Self::bytes(data),
        }
    }

    fn numeric(digits: &[u8]) -> Self {
        let mut bits = BitBuffer::default();
        for group in digits.chunks(3) {
            let value = group.iter().fold(0u32, |acc, &d| acc * 10 + u32::from(d - b'0'));
            bits.push(value, group.len() * 3 + 1);
        }
        Self {
            mode: Mode::Numeric,
            chars: digits.len(),
            bits,
        }
    }

    fn alphanumeric(values: &[u32]) -> Self {
        let mut bits = BitBuffer::default();
        for pair in values.chunks(2) {
            match pair {
                [a, b] => bits.push(a * 45 + b, 11),
                [a] => bits.push(*a, 6),
                _ => {}
            }
        }
        Self {
            mode: Mode::Alphanumeric,
            chars: values.len(),
            bits,
        }
    }

    fn bytes(data: &[u8]) -> Self {
        let mut bits = BitBuffer::default();
        for &b in data {
            bits.push(u32::from(b), 8);
        }
        Self {
            mode: Mode::Byte,
            chars: data.len(),
            bits,
        }
    }

    /// Header plus payload bits at `version`.
    fn encoded_bits(&self, version: Version) -> usize {
        4 + self.mode.char_count_bits(version) + self.bits.len()
    }

    /// Terminated, padded data codewords for `version`, or the capacity error.
    fn data_codewords(&self, version: Version, ec: EcLevel) -> Result<Vec<u8>> {
        let capacity = version.data_capacity_bits(ec);
        let count_bits = self.mode.char_count_bits(version);
        let required = self.encoded_bits(version);
        if required > capacity || self.chars >= 1 << count_bits {
            return Err(QrArtifactError::CapacityExceeded {
                required_bits: required,
                capacity_bits: capacity,
                version: version.value(),
                ec,
            });
        }

        let mut bb = BitBuffer::default();
        bb.push(self.mode.indicator(), 4);
        bb.push(self.chars as u32, count_bits);
        bb.append(&self.bits);

        bb.push(0, (capacity - bb.len()).min(4));
        bb.push(0, bb.len().wrapping_neg() & 7);
        for &pad in [0xec, 0x11].iter().cycle() {
            if bb.len() >= capacity {
                break;
            }
            bb.push(pad, 8);
        }
        Ok(bb.to_bytes())
    }
}

#[derive(Default)]
struct BitBuffer(Vec<bool>);

impl BitBuffer {
    fn len(&self) -> usize {
        self.0.len()
    }

    /// Appends the low `len` bits of `value`, most significant first.
    fn push(&mut self, value: u32, len: usize) {
        debug_assert!(len <= 31 && value >> len == 0);
        self.0.extend((0..len).rev().map(|i| (value >> i) & 1 != 0));
    }

    fn append(&mut self, other: &BitBuffer) {
        self.0.extend_from_slice(&other.0);
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.0
            .chunks(8)
            .map(|chunk| chunk.iter().enumerate().fold(0u8, |acc, (i, &b)| acc | (u8::from(b) << (7 - i))))
            .collect()
    }
}

/// Splits data into blocks, appends Reed-Solomon ECC to each, then interleaves.
fn add_ecc_and_interleave(data: &[u8], version: Version, ec: EcLevel) -> Vec<u8> {
    debug_assert_eq!(data.len(), version.data_codewords(ec));
    let num_blocks = table_get(&NUM_ERROR_CORRECTION_BLOCKS, version, ec);
    let ecc_len = table_get(&ECC_CODEWORDS_PER_BLOCK, version, ec);
    let raw = version.raw_data_modules() / 8;
    let short_blocks = num_blocks - raw % num_blocks;
    let short_len = raw / num_blocks;

    let divisor = reed_solomon_divisor(ecc_len);
    let mut blocks: Vec<Vec<u8>> = Vec::with_capacity(num_blocks);
    let mut rest = data;
    for i in 0..num_blocks {
        let take = short_len - ecc_len + usize::from(i >= short_blocks);
        let (chunk, tail) = rest.split_at(take);
        rest = tail;
        let mut block = chunk.to_vec();
        let ecc = reed_solomon_remainder(chunk, &divisor);
        if i < short_blocks {
            // Keeps every block the same length for the interleave below
            block.push(0);
        }
        block.extend_from_slice(&ecc);
        blocks.push(block);
    }

    let mut result = Vec::with_capacity(raw);
    for i in 0..=short_len {
        for (j, block) in blocks.iter().enumerate() {
            if i != short_len - ecc_len || j >= short_blocks {
                result.push(block[i]);
            }
        }
    }
    result
}

fn reed_solomon_divisor(degree: usize) -> Vec<u8> {
    let mut divisor = vec![0u8; degree];
    divisor[degree - 1] = 1;
    let mut root = 1u8;
    for _ in 0..degree {
        for j in 0..degree {
            divisor[j] = gf_multiply(divisor[j], root);
            if j + 1 < degree {
                divisor[j] ^= divisor[j + 1];
            }
        }
        root = gf_multiply(root, 0x02);
    }
    divisor
}

fn reed_solomon_remainder(data: &[u8], divisor: &[u8]) -> Vec<u8> {
    let mut remainder = vec![0u8; divisor.len()];
    for &b in data {
        let factor = b ^ remainder[0];
        remainder.rotate_left(1);
        if let Some(last) = remainder.last_mut() {
            *last = 0;
        }
        for (r, &d) in remainder.iter_mut().zip(divisor) {
            *r ^= gf_multiply(d, factor);
        }
    }
    remainder
}

/// Multiplication in GF(2^8) modulo x^8 + x^4 + x^3 + x^2 + 1.
fn gf_multiply(x: u8, y: u8) -> u8 {
    let mut z = 0u8;
    for i in (0..8).rev() {
        z = (z << 1) ^ ((z >> 7) * 0x1d);
        z ^= ((y >> i) & 1) * x;
    }
    z
}

fn bit(x: u32, i: usize) -> bool {
    (x >> i) & 1 != 0
}

fn alphanumeric_value(b: u8) -> Option<u32> {
    ALPHANUMERIC_CHARSET.iter().position(|&c| c == b).map(|i| i as u32)
}

fn table_get(table: &'static [[i8; 41]; 4], version: Version, ec: EcLevel) -> usize {
    table[ec.ordinal()][usize::from(version.value())] as usize
}

static ALPHANUMERIC_CHARSET: &[u8; 45] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ $%*+-./:";

const PENALTY_N1: i32 = 3;
const PENALTY_N2: i32 = 3;
const PENALTY_N3: i32 = 40;
const PENALTY_N4: i32 = 10;

// Indexed by [ec ordinal][version]; index 0 is unused.
static ECC_CODEWORDS_PER_BLOCK: [[i8; 41]; 4] = [
    [
        -1, 7, 10, 15, 20, 26, 18, 20, 24, 30, 18, 20, 24, 26, 30, 22, 24, 28, 30, 28, 28, 28, 28, 30,
        30, 26, 28, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ],
    [
        -1, 10, 16, 26, 18, 24, 16, 18, 22, 22, 26, 30, 22, 22, 24, 24, 28, 28, 26, 26, 26, 26, 28, 28,
        28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28,
    ],
    [
        -1, 13, 22, 18, 26, 18, 24, 18, 22, 20, 24, 28, 26, 24, 20, 30, 24, 28, 28, 26, 30, 28, 30, 30,
        30, 30, 28, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ],
    [
        -1, 17, 28, 22, 16, 22, 28, 26, 26, 24, 28, 24, 28, 22, 24, 24, 30, 28, 28, 26, 28, 30, 24, 30,
        30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ],
];

static NUM_ERROR_CORRECTION_BLOCKS: [[i8; 41]; 4] = [
    [
        -1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 4, 4, 4, 4, 4, 6, 6, 6, 6, 7, 8, 8, 9, 9, 10, 12, 12, 12,
        13, 14, 15, 16, 17, 18, 19, 19, 20, 21, 22, 24, 25,
    ],
    [
        -1, 1, 1, 1, 2, 2, 4, 4, 4, 5, 5, 5, 8, 9, 9, 10, 10, 11, 13, 14, 16, 17, 17, 18, 20, 21,
        23, 25, 26, 28, 29, 31, 33, 35, 37, 38, 40, 43, 45, 47, 49,
    ],
    [
        -1, 1, 1, 2, 2, 4, 4, 6, 6, 8, 8, 8, 10, 12, 16, 12, 17, 16, 18, 21, 20, 23, 23, 25, 27, 29,
        34, 34, 35, 38, 40, 43, 45, 48, 51, 53, 56, 59, 62, 65, 68,
    ],
    [
        -1, 1, 1, 2, 4, 4, 4, 5, 6, 8, 8, 11, 11, 16, 16, 18, 16, 19, 21, 25, 25, 25, 34, 30, 32, 35,
        37, 40, 42, 45, 48, 51, 54, 57, 60, 63, 66, 70, 74, 77, 81,
    ],
];

#[cfg(test)]
mod tests {
    use super::*;

    fn read_format_bits(qr: &QrCode) -> u32 {
        let mut positions: Vec<(usize, usize)> = (0..6).map(|i| (8, i)).collect();
        positions.extend([(8, 7), (8, 8), (7, 8)]);
        positions.extend((9..15).map(|i| (14 - i, 8)));
        positions
            .iter()
            .enumerate()
            .fold(0, |acc, (i, &(x, y))| acc | (u32::from(qr.is_dark(x, y)) << i))
    }

    #[test]
    fn test_mode_selection() {
        assert_eq!(Segment::for_payload(b"0123456789").mode, Mode::Numeric);
        assert_eq!(Segment::for_payload(b"ABC123").mode, Mode::Alphanumeric);
        assert_eq!(Segment::for_payload(b"Hello World").mode, Mode::Byte);
    }

    #[test]
    fn test_version_bounds() {
        assert!(Version::new(0).is_err());
        assert!(Version::new(41).is_err());
        assert_eq!(Version::new(40).unwrap(), Version::MAX);
        assert_eq!(Version::MAX.side(), 177);
    }

    #[test]
    fn test_version_one_capacity() {
        assert_eq!(Version::MIN.data_capacity_bits(EcLevel::L), 152);
        assert_eq!(Version::MIN.data_capacity_bits(EcLevel::H), 72);
    }

    #[test]
    fn test_alignment_centers() {
        assert!(Version::MIN.alignment_centers().is_empty());
        assert_eq!(Version::new(2).unwrap().alignment_centers(), vec![6, 18]);
        assert_eq!(Version::new(7).unwrap().alignment_centers(), vec![6, 22, 38]);
    }

    #[test]
    fn test_byte_capacity_edge() {
        let fits = vec![b'a'; 17];
        let qr = QrCode::encode(&fits, Version::MIN, EcLevel::L).unwrap();
        assert_eq!(qr.size(), 21);

        let too_long = vec![b'a'; 18];
        match QrCode::encode(&too_long, Version::MIN, EcLevel::L) {
            Err(QrArtifactError::CapacityExceeded { required_bits, capacity_bits, version, ec }) => {
                assert_eq!(required_bits, 156);
                assert_eq!(capacity_bits, 152);
                assert_eq!(version, 1);
                assert_eq!(ec, EcLevel::L);
            }
            other => panic!("expected CapacityExceeded, got {:?}", other),
        }
    }

    #[test]
    fn test_numeric_and_alphanumeric_capacity() {
        assert!(QrCode::encode(&[b'7'; 41], Version::MIN, EcLevel::L).is_ok());
        assert!(QrCode::encode(&[b'7'; 42], Version::MIN, EcLevel::L).is_err());
        assert!(QrCode::encode(&[b'Z'; 25], Version::MIN, EcLevel::L).is_ok());
        assert!(QrCode::encode(&[b'Z'; 26], Version::MIN, EcLevel::L).is_err());
    }

    #[test]
    fn test_encode_fit_grows_version() {
        let qr = QrCode::encode_fit(&[b'a'; 18], Version::MIN, EcLevel::L).unwrap();
        assert_eq!(qr.version().value(), 2);
        assert_eq!(qr.size(), 25);
        assert!(QrCode::encode_fit(&vec![b'a'; 3000], Version::MIN, EcLevel::L).is_err());
    }

    #[test]
    fn test_deterministic() {
        let a = QrCode::encode(b"https://example.com", Version::new(3).unwrap(), EcLevel::M).unwrap();
        let b = QrCode::encode(b"https://example.com", Version::new(3).unwrap(), EcLevel::M).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_finder_patterns() {
        let qr = QrCode::encode(b"ABC123", Version::MIN, EcLevel::L).unwrap();
        let last = qr.size() - 1;
        for (x, y) in [(0, 0), (last, 0), (0, last), (3, 3), (last - 3, 3), (3, last - 3)] {
            assert!(qr.is_dark(x, y), "({x}, {y}) should be dark");
        }
        // separator and inner ring are light
        assert!(!qr.is_dark(7, 0));
        assert!(!qr.is_dark(1, 1));
        // always-dark module
        assert!(qr.is_dark(8, qr.size() - 8));
        assert!(!qr.is_dark(qr.size(), 0));
    }

    #[test]
    fn test_format_bits_round_trip() {
        for ec in [EcLevel::L, EcLevel::M, EcLevel::Q, EcLevel::H] {
            let qr = QrCode::encode(b"42", Version::MIN, ec).unwrap();
            let data = (read_format_bits(&qr) ^ 0x5412) >> 10;
            assert_eq!(data >> 3, ec.format_bits());
            assert_eq!(data & 7, u32::from(qr.mask().value()));
        }
    }

    #[test]
    fn test_interleave_length() {
        let version = Version::new(5).unwrap();
        let data = vec![0x42; version.data_codewords(EcLevel::Q)];
        let all = add_ecc_and_interleave(&data, version, EcLevel::Q);
        assert_eq!(all.len(), version.raw_data_modules() / 8);
    }

    #[test]
    fn test_gf_multiply() {
        assert_eq!(gf_multiply(0x80, 0x02), 0x1d);
        assert_eq!(gf_multiply(0x53, 0x01), 0x53);
        assert_eq!(gf_multiply(0x00, 0xff), 0x00);
    }

    #[test]
    fn test_bit_buffer_packing() {
        let mut bb = BitBuffer::default();
        bb.push(0b101, 3);
        bb.push(0b1, 1);
        bb.push(0xff, 8);
        assert_eq!(bb.len(), 12);
        assert_eq!(bb.to_bytes(), vec![0b1011_1111, 0b1111_0000]);
    }
}
