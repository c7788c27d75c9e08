pub(crate) mod dao;
