#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Page {
    Home,
    Consultation,
    MedicalReport,
}

impl Page {
    pub fn path(&self) -> &'static str {
        match self {
            Page::Home => return "/",
            Page::Consultation => return "/consultation",
            Page::MedicalReport => return "/medical_report",
        }
    }
}
