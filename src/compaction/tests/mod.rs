mod tests_pack;
