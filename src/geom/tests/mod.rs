mod test_recognize_basic;
mod test_ribbon_basic;
mod test_segment_basic;
