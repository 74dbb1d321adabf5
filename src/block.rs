use std::mem;

/// Alignment the heap bottom and every payload address are guaranteed to
/// keep. The growth primitive must hand out 8-aligned memory; anything
/// else is treated as corruption.
pub(crate) const ALIGNMENT: usize = 8;

/// Reserved offset standing in for a null link. Offset 0 names the
/// sentinel head, so the all-ones pattern is the one offset that can
/// never name a block.
pub(crate) const NIL: usize = usize::MAX;

/// Status words. They are stored raw in arena memory and validated on
/// every decode; an unrecognized value means the header was overwritten.
pub(crate) const USED: usize = 0;
pub(crate) const FREE: usize = 1;

/// Overhead every block carries in front of its payload, the sentinel
/// included. Requested sizes are padded up to a multiple of this, which
/// keeps all headers naturally aligned and the offset arithmetic simple.
pub(crate) const HEADER_SIZE: usize = mem::size_of::<Header>();

/// Smallest surplus worth splitting off a free block. Below this the
/// whole block is handed out and the extra bytes stay as internal
/// fragmentation, since the remainder could not even host a header.
pub(crate) const SPLIT_MINIMUM: usize = 2 * HEADER_SIZE;

const _: () = assert!(HEADER_SIZE % ALIGNMENT == 0);

/// Metadata preceding every payload in the arena. Blocks are laid out
/// header-then-payload, back to back, so the block after `B` always
/// starts at `offset(B) + HEADER_SIZE + B.size`:
///
/// ```text
/// +---------------------+ <------+
/// |        size         |        |
/// +---------------------+        |
/// |       status        |        |
/// +---------------------+        | -> Header
/// |        prev         |        |
/// +---------------------+        |
/// |      next_free      |        |
/// +---------------------+ <------+
/// |       Payload       |        |
/// |         ...         |        | -> Addressable content
/// |         ...         |        |
/// +---------------------+ <------+
/// ```
///
/// All links are byte offsets from the arena base rather than raw
/// pointers; [`NIL`] plays the role of the null link. The header is read
/// and written as one plain-old-data value, so nothing here can dangle.
#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct Header {
    /// Payload capacity in bytes, header excluded.
    pub size: usize,
    /// Status word, [`USED`] or [`FREE`].
    pub status: usize,
    /// Offset of the block immediately preceding this one in address
    /// order. [`NIL`] only for the sentinel head.
    pub prev: usize,
    /// Next entry in the free list. [`NIL`] whenever the block is used,
    /// and for the last free block.
    pub next_free: usize,
}

impl Header {
    /// Decodes the status word, refusing to guess on garbage.
    pub fn is_free(&self) -> bool {
        match self.status {
            FREE => true,
            USED => false,
            other => panic!("unrecognized block status word {other:#x}: heap corrupted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_four_words() {
        assert_eq!(HEADER_SIZE, 4 * mem::size_of::<usize>());
    }

    #[test]
    fn status_decoding() {
        let mut header = Header {
            size: 0,
            status: FREE,
            prev: NIL,
            next_free: NIL,
        };
        assert!(header.is_free());

        header.status = USED;
        assert!(!header.is_free());
    }

    #[test]
    #[should_panic(expected = "unrecognized block status word")]
    fn garbage_status_is_fatal() {
        let header = Header {
            size: 0,
            status: 0xdead,
            prev: NIL,
            next_free: NIL,
        };
        let _ = header.is_free();
    }
}
