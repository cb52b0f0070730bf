pub mod test_eval;
pub mod test_grad;
