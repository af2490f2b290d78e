pub mod parsers {
    pub mod combo_parser;
    pub mod settings_parser;
    pub mod table_parser;
}

pub mod analysis {
    pub mod backend;
    pub mod configure;
    pub mod controller;
    pub mod pages;
    pub mod params;
    pub mod session;
}

pub mod utils {
    pub mod archive;
    pub mod export;
    pub mod html;
    pub mod upload;
    pub mod workspace;
}
