mod bitset_test;
mod json_test;
mod langdef_test;
mod lexer_test;
mod source_test;
