mod tests_build;
