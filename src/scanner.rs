// scanner.rs — Byte-signature scanning over the host module's image.
//
// Every patch site is located by a signature: an IDA-style byte string
// ("41 ?? 8B ...") where "??" matches any byte. Signatures are valid only
// for one exact build of the game executable; a binary update invalidates
// all of them at once, so a failed scan is an expected, non-fatal outcome
// that callers log and skip.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("empty signature")]
    Empty,
    #[error("bad signature token {0:?}")]
    BadToken(String),
}

/// A wildcard-tolerant byte pattern describing one code location.
///
/// Parsed from the conventional hex-dump form: two-digit hex bytes and
/// "?"/"??" wildcards, whitespace separated.
pub struct Signature {
    bytes: Vec<u8>,
    mask: Vec<bool>, // true = byte must match, false = wildcard
}

impl Signature {
    pub fn parse(pattern: &str) -> Result<Self, ScanError> {
        let mut bytes = Vec::new();
        let mut mask = Vec::new();

        for token in pattern.split_whitespace() {
            if token == "?" || token == "??" {
                bytes.push(0);
                mask.push(false);
            } else if let Ok(b) = u8::from_str_radix(token, 16) {
                bytes.push(b);
                mask.push(true);
            } else {
                return Err(ScanError::BadToken(token.to_string()));
            }
        }

        if bytes.is_empty() {
            return Err(ScanError::Empty);
        }
        Ok(Self { bytes, mask })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    fn matches_at(&self, window: &[u8]) -> bool {
        for (i, &b) in self.bytes.iter().enumerate() {
            if self.mask[i] && window[i] != b {
                return false;
            }
        }
        true
    }

    /// Byte-wise search for the first occurrence in `region`.
    /// Returns the match offset, or None. The image does not change while
    /// we scan, so there is no retry path.
    pub fn scan(&self, region: &[u8]) -> Option<usize> {
        if region.len() < self.bytes.len() {
            return None;
        }
        for start in 0..=(region.len() - self.bytes.len()) {
            if self.matches_at(&region[start..start + self.bytes.len()]) {
                return Some(start);
            }
        }
        None
    }
}

// ============================================================
// Host module image
// ============================================================

/// The loaded image of the game executable: scan target for every site.
#[cfg(windows)]
pub struct ModuleImage {
    base: usize,
    size: usize,
    name: String,
}

#[cfg(windows)]
impl ModuleImage {
    /// Resolve the main executable module of the current process.
    pub unsafe fn current_exe() -> Option<Self> {
        use winapi::um::libloaderapi::{GetModuleFileNameA, GetModuleHandleA};
        use winapi::um::processthreadsapi::GetCurrentProcess;
        use winapi::um::psapi::{GetModuleInformation, MODULEINFO};

        let exe = GetModuleHandleA(std::ptr::null());
        if exe.is_null() {
            return None;
        }

        let mut info: MODULEINFO = std::mem::zeroed();
        let ok = GetModuleInformation(
            GetCurrentProcess(),
            exe,
            &mut info,
            std::mem::size_of::<MODULEINFO>() as u32,
        );
        if ok == 0 {
            return None;
        }

        let mut buf = [0u8; 512];
        let len = GetModuleFileNameA(exe, buf.as_mut_ptr() as _, buf.len() as u32) as usize;
        let name = std::str::from_utf8(&buf[..len])
            .ok()
            .and_then(|p| p.rsplit(['\\', '/']).next())
            .unwrap_or("game.exe")
            .to_string();

        Some(Self {
            base: info.lpBaseOfDll as usize,
            size: info.SizeOfImage as usize,
            name,
        })
    }

    pub fn base(&self) -> usize {
        self.base
    }

    /// Executable file name, used to report match addresses as exe+offset.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The whole loaded image as a byte slice. Mapped PE images are fully
    /// committed, so reading the range [base, base+size) does not fault.
    pub unsafe fn bytes(&self) -> &[u8] {
        std::slice::from_raw_parts(self.base as *const u8, self.size)
    }

    /// First match of `sig`, as an absolute address plus image-relative
    /// offset for logging.
    pub unsafe fn find(&self, sig: &Signature) -> Option<(usize, usize)> {
        sig.scan(self.bytes()).map(|off| (self.base + off, off))
    }

    /// PE header TimeDateStamp, logged at startup so a log file from a
    /// mismatched game build is recognizable.
    pub unsafe fn timestamp(&self) -> u32 {
        let e_lfanew = std::ptr::read_unaligned((self.base + 0x3C) as *const u32) as usize;
        std::ptr::read_unaligned((self.base + e_lfanew + 8) as *const u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wildcards_and_bytes() {
        let sig = Signature::parse("48 8B ?? ?? C3").unwrap();
        assert_eq!(sig.len(), 5);
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert!(matches!(Signature::parse("   "), Err(ScanError::Empty)));
        assert!(matches!(
            Signature::parse("48 8G"),
            Err(ScanError::BadToken(_))
        ));
    }

    #[test]
    fn finds_signature_at_known_offset() {
        let mut buf = vec![0x90u8; 64];
        buf[17..22].copy_from_slice(&[0x48, 0x8B, 0x05, 0x12, 0xC3]);
        let sig = Signature::parse("48 8B ?? ?? C3").unwrap();
        assert_eq!(sig.scan(&buf), Some(17));
    }

    #[test]
    fn absent_signature_is_none() {
        let buf = vec![0xCCu8; 256];
        let sig = Signature::parse("48 8B 05").unwrap();
        assert_eq!(sig.scan(&buf), None);
    }

    #[test]
    fn repeated_partial_matches_do_not_false_positive() {
        // Prefix "48 8B" occurs many times, full pattern never does.
        let mut buf = Vec::new();
        for _ in 0..32 {
            buf.extend_from_slice(&[0x48, 0x8B, 0x00]);
        }
        let sig = Signature::parse("48 8B 05 ?? C3").unwrap();
        assert_eq!(sig.scan(&buf), None);

        // Now plant one real match after the decoys.
        buf.extend_from_slice(&[0x48, 0x8B, 0x05, 0xAA, 0xC3]);
        assert_eq!(sig.scan(&buf), Some(96));
    }

    #[test]
    fn wildcard_matches_any_value() {
        let sig = Signature::parse("?? FF").unwrap();
        assert_eq!(sig.scan(&[0x00, 0xFF]), Some(0));
        assert_eq!(sig.scan(&[0xAB, 0xFF]), Some(0));
    }

    #[test]
    fn region_shorter_than_signature() {
        let sig = Signature::parse("48 8B 05").unwrap();
        assert_eq!(sig.scan(&[0x48, 0x8B]), None);
    }
}
