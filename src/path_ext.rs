use std::path::Path;

pub trait PathExt {
    fn has_iso_extension(&self) -> bool;
}

impl PathExt for Path {
    fn has_iso_extension(&self) -> bool {
        self.extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("iso"))
    }
}
