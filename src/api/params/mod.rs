pub mod compress_params;
