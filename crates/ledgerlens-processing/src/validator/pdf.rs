/// Whether the PDF declares an encryption dictionary.
pub fn is_password_protected(data: &[u8]) -> bool {
    const MARKER: &[u8] = b"/Encrypt";
    data.windows(MARKER.len()).any(|w| w == MARKER)
}
