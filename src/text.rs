/// Assembles the final plate text from classified characters and their plate columns.
pub trait TextReconstructor: Send + Sync {
    fn reconstruct(&self, text: &str, columns: &[u32]) -> String;
}

/// Orders characters left to right by the column they were found at.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColumnOrderReconstructor;

impl TextReconstructor for ColumnOrderReconstructor {
    fn reconstruct(&self, text: &str, columns: &[u32]) -> String {
        let characters = text.chars().collect::<Vec<_>>();
        if characters.len() != columns.len() {
            log::warn!(
                "Got {} characters for {} columns, keeping classifier order",
                characters.len(),
                columns.len()
            );
            return text.to_string();
        }
        let mut positioned = columns.iter().zip(characters).collect::<Vec<_>>();
        positioned.sort_by_key(|(column, _)| **column);
        positioned.into_iter().map(|(_, character)| character).collect()
    }
}
